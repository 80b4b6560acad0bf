use crate::keypad::{DEFAULT_SCAN_INTERVAL, Edge, EdgeSource, PinEvent};
use crate::{
    CancelToken, GpioBias, GpioDriver, GpioError, GpioInput, GpioOutput, GpioResult, PinOptions,
};
use log::trace;
use std::collections::VecDeque;
use std::fmt::{Debug, Formatter};
use std::thread::sleep;
use std::time::{Duration, Instant};

/// Edge source that strobes the columns of a keyboard matrix over GPIO.
///
/// The column pins are driven one at a time while the row pins are sampled;
/// every level change against the previous sweep is queued as a [PinEvent].
/// The source exclusively owns its pin handles; dropping it releases them.
pub struct GpioEdgeSource<'a> {
    rows: Vec<Box<dyn GpioInput + 'a>>,
    cols: Vec<Box<dyn GpioOutput + 'a>>,
    /// Last sampled level per (row, column) intersection.
    state: Vec<Vec<bool>>,
    queue: VecDeque<PinEvent>,
    scan_interval: Duration,
}

impl Debug for GpioEdgeSource<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "GpioEdgeSource({}x{})", self.rows.len(), self.cols.len())
    }
}

impl<'a> GpioEdgeSource<'a> {
    /// Opens the given input (row) and output (column) pins on `driver` and
    /// scans them at the default interval.
    pub fn new(
        driver: &'a dyn GpioDriver,
        input_pins: &[usize],
        output_pins: &[usize],
    ) -> GpioResult<Self> {
        Self::with_scan_interval(driver, input_pins, output_pins, DEFAULT_SCAN_INTERVAL)
    }

    pub fn with_scan_interval(
        driver: &'a dyn GpioDriver,
        input_pins: &[usize],
        output_pins: &[usize],
        scan_interval: Duration,
    ) -> GpioResult<Self> {
        if input_pins.is_empty() || output_pins.is_empty() {
            return Err(GpioError::Config(
                "a keyboard matrix needs at least one input and one output pin".into(),
            ));
        }

        let mut rows = Vec::with_capacity(input_pins.len());
        for &pin in input_pins {
            rows.push(driver.open_input(pin, PinOptions::default().with_bias(GpioBias::PullDown))?);
        }

        let mut cols = Vec::with_capacity(output_pins.len());
        for &pin in output_pins {
            let col = driver.open_output(pin, PinOptions::default())?;
            col.write(false)?;
            cols.push(col);
        }

        let state = vec![vec![false; cols.len()]; rows.len()];

        Ok(GpioEdgeSource {
            rows,
            cols,
            state,
            queue: VecDeque::new(),
            scan_interval,
        })
    }

    /// Strobes every column once and queues the observed transitions.
    fn sweep(&mut self) -> GpioResult<()> {
        for (c, col) in self.cols.iter().enumerate() {
            col.write(true)?;

            for (r, row) in self.rows.iter().enumerate() {
                let level = row.read()?;
                if level != self.state[r][c] {
                    self.state[r][c] = level;
                    let edge = if level { Edge::Rising } else { Edge::Falling };
                    trace!("{:?} edge at ({}, {})", edge, r, c);
                    self.queue.push_back(PinEvent {
                        input: r,
                        output: c,
                        edge,
                    });
                }
            }

            col.write(false)?;
        }

        Ok(())
    }
}

impl EdgeSource for GpioEdgeSource<'_> {
    fn rows(&self) -> usize {
        self.rows.len()
    }

    fn cols(&self) -> usize {
        self.cols.len()
    }

    fn scan_interval(&self) -> Duration {
        self.scan_interval
    }

    fn next_event(&mut self, cancel: &CancelToken) -> GpioResult<PinEvent> {
        loop {
            cancel.checkpoint()?;

            if let Some(event) = self.queue.pop_front() {
                return Ok(event);
            }

            self.sweep()?;

            if self.queue.is_empty() {
                sleep(self.scan_interval);
            }
        }
    }

    fn next_event_before(
        &mut self,
        deadline: Instant,
        cancel: &CancelToken,
    ) -> GpioResult<Option<PinEvent>> {
        loop {
            cancel.checkpoint()?;

            if let Some(event) = self.queue.pop_front() {
                return Ok(Some(event));
            }

            self.sweep()?;

            // An event found in this sweep wins over a deadline met meanwhile.
            if let Some(event) = self.queue.pop_front() {
                return Ok(Some(event));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }

            sleep(self.scan_interval.min(deadline - now));
        }
    }
}
