pub mod keypad;
pub mod lcd_display;
pub mod lcd_keypad;
pub mod led_blinking;
pub mod thermometer;
