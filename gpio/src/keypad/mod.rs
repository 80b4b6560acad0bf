mod gpio;

use crate::debounce::DebounceWindow;
use crate::{CancelToken, GpioError, GpioResult};
pub use gpio::*;
use log::{debug, trace};
use std::fmt::Debug;
use std::time::{Duration, Instant};

/// Default cadence at which the columns of a keyboard matrix are strobed.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_millis(10);

/// The kind of a pin transition.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Edge {
    /// Inactive to active; a key contact closing.
    Rising,
    /// Active to inactive; a key contact opening.
    Falling,
}

/// A transition observed at one intersection of the keyboard matrix.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PinEvent {
    /// Index of the input (row) line the transition was read on.
    pub input: usize,
    /// Index of the output (column) line that was strobed when the transition was read.
    pub output: usize,
    pub edge: Edge,
}

/// A rectangular table of key symbols, one per matrix intersection.
///
/// Immutable after construction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KeyMap {
    keys: Vec<Vec<char>>,
}

impl KeyMap {
    /// Builds a key map from rows of symbols.
    ///
    /// # Errors
    /// - `GpioError::Config` if the table is empty or not rectangular.
    pub fn new(keys: Vec<Vec<char>>) -> GpioResult<Self> {
        if keys.is_empty() || keys[0].is_empty() {
            return Err(GpioError::Config("the key map must not be empty".into()));
        }

        let cols = keys[0].len();
        if keys.iter().any(|row| row.len() != cols) {
            return Err(GpioError::Config("the key map must be rectangular".into()));
        }

        Ok(KeyMap { keys })
    }

    pub fn rows(&self) -> usize {
        self.keys.len()
    }

    pub fn cols(&self) -> usize {
        self.keys[0].len()
    }

    pub fn key_at(&self, row: usize, col: usize) -> Option<char> {
        self.keys.get(row)?.get(col).copied()
    }
}

/// A source of pin-transition events for a keyboard matrix.
///
/// Implementations own the underlying row and column lines and observe them as a
/// lazy, infinite sequence of [PinEvent]s. [GpioEdgeSource] is the hardware
/// implementation; tests substitute scripted ones.
pub trait EdgeSource: Debug {
    /// The number of input (row) lines.
    fn rows(&self) -> usize;

    /// The number of output (column) lines.
    fn cols(&self) -> usize;

    /// The cadence at which the matrix is scanned.
    fn scan_interval(&self) -> Duration;

    /// Blocks until the next transition is observed.
    ///
    /// There is no timeout; the call returns only with an event, or with
    /// `Err(GpioError::Cancelled)` once cancellation is requested on `cancel`.
    fn next_event(&mut self, cancel: &CancelToken) -> GpioResult<PinEvent>;

    /// Like [EdgeSource::next_event], but gives up once `deadline` has passed,
    /// returning `Ok(None)`.
    ///
    /// Implementations must look for an event before consulting the clock, so
    /// an event that lands together with the deadline still gets through.
    fn next_event_before(
        &mut self,
        deadline: Instant,
        cancel: &CancelToken,
    ) -> GpioResult<Option<PinEvent>>;
}

/// Per-keypress disambiguation state.
///
/// Opened when a rising edge starts a scan, dropped as soon as the key is
/// resolved or the debounce window expires. Holds every column that has not yet
/// been ruled out; the trigger column itself is never a candidate for
/// elimination.
struct ScanSession {
    trigger: usize,
    candidates: Vec<usize>,
    window: DebounceWindow,
}

impl ScanSession {
    fn open(trigger: usize, cols: usize, scan_interval: Duration) -> Self {
        let candidates = (0..cols).filter(|&col| col != trigger).collect();
        // One strobe per column plus slack for the edges to settle.
        let window = DebounceWindow::start(scan_interval * (cols as u32 + 3));
        ScanSession {
            trigger,
            candidates,
            window,
        }
    }

    fn eliminate(&mut self, col: usize) {
        self.candidates.retain(|&candidate| candidate != col);
    }

    /// The resolved column, once every other column has been ruled out.
    fn resolved(&self) -> Option<usize> {
        self.candidates.is_empty().then_some(self.trigger)
    }
}

/// A matrix keyboard that resolves single key presses by column elimination.
///
/// A closing key contact produces a rising edge the moment its row goes active,
/// but the strobing of neighbouring columns can mirror that edge onto them
/// (ghosting). The pressed column is found by watching which columns *do*
/// report further rising edges within one debounce window and eliminating them;
/// the column left standing is the pressed one. Chorded presses are not
/// disambiguated.
///
/// The keyboard is a single logical reader: [MatrixKeyboard::read_key] takes
/// `&mut self`, so overlapping reads cannot race on a scan session.
#[derive(Debug)]
pub struct MatrixKeyboard<S> {
    source: S,
    key_map: KeyMap,
}

impl<S: EdgeSource> MatrixKeyboard<S> {
    /// Creates a keyboard over an edge source.
    ///
    /// # Errors
    /// - `GpioError::Config` if the key map dimensions do not match the
    ///   source's row and column line counts.
    pub fn new(source: S, key_map: KeyMap) -> GpioResult<Self> {
        if key_map.rows() != source.rows() {
            return Err(GpioError::Config(format!(
                "input pin count ({}) does not match the key map row count ({})",
                source.rows(),
                key_map.rows()
            )));
        }

        if key_map.cols() != source.cols() {
            return Err(GpioError::Config(format!(
                "output pin count ({}) does not match the key map column count ({})",
                source.cols(),
                key_map.cols()
            )));
        }

        Ok(MatrixKeyboard { source, key_map })
    }

    pub fn key_map(&self) -> &KeyMap {
        &self.key_map
    }

    /// Blocks until a key press is resolved and returns its symbol.
    ///
    /// A disambiguation attempt that runs out of its debounce window is not an
    /// error; the wait silently starts over. Cancellation requested on `cancel`
    /// surfaces as `Err(GpioError::Cancelled)` from any wait point.
    pub fn read_key(&mut self, cancel: &CancelToken) -> GpioResult<char> {
        loop {
            let event = self.source.next_event(cancel)?;

            if event.edge != Edge::Rising {
                continue;
            }

            trace!(
                "rising edge at ({}, {}), disambiguating",
                event.input, event.output
            );

            match self.disambiguate(event.output, cancel)? {
                Some(col) => {
                    // The row and column are both in range by construction.
                    let key = self
                        .key_map
                        .key_at(event.input, col)
                        .ok_or(GpioError::InvalidArgument)?;
                    debug!("resolved key {:?} at ({}, {})", key, event.input, col);
                    return Ok(key);
                }
                None => {
                    trace!("debounce window expired, restarting scan");
                }
            }
        }
    }

    /// Runs one scan session for the column triggered at `trigger`.
    ///
    /// Returns the resolved column, or `None` if the debounce window expired
    /// before every other column was ruled out. Resolution is checked before
    /// the window, so a tie between the final eliminating edge and the timer
    /// resolves the key.
    fn disambiguate(&mut self, trigger: usize, cancel: &CancelToken) -> GpioResult<Option<usize>> {
        let mut session =
            ScanSession::open(trigger, self.key_map.cols(), self.source.scan_interval());

        loop {
            if let Some(col) = session.resolved() {
                return Ok(Some(col));
            }

            match self
                .source
                .next_event_before(session.window.deadline(), cancel)?
            {
                Some(event) if event.edge == Edge::Rising => session.eliminate(event.output),
                Some(_) => {} // Falling edges carry no information here.
                None => return Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::VecDeque;

    /// One entry of a scripted event sequence.
    #[derive(Debug)]
    enum Step {
        Edge(PinEvent),
        /// A stretch of silence long enough for the debounce window to expire.
        Quiet,
        /// Cancellation arriving from outside while the source is waited on.
        Cancel(CancelToken),
    }

    #[derive(Debug)]
    struct ScriptedSource {
        rows: usize,
        cols: usize,
        steps: VecDeque<Step>,
    }

    impl ScriptedSource {
        fn new(rows: usize, cols: usize, steps: Vec<Step>) -> Self {
            ScriptedSource {
                rows,
                cols,
                steps: steps.into(),
            }
        }
    }

    impl EdgeSource for ScriptedSource {
        fn rows(&self) -> usize {
            self.rows
        }

        fn cols(&self) -> usize {
            self.cols
        }

        fn scan_interval(&self) -> Duration {
            DEFAULT_SCAN_INTERVAL
        }

        fn next_event(&mut self, cancel: &CancelToken) -> GpioResult<PinEvent> {
            loop {
                cancel.checkpoint()?;
                match self.steps.pop_front() {
                    Some(Step::Edge(event)) => return Ok(event),
                    // A blocking wait just sits out a quiet stretch.
                    Some(Step::Quiet) => continue,
                    Some(Step::Cancel(token)) => token.cancel(),
                    None => return Err(GpioError::Other("script exhausted".into())),
                }
            }
        }

        fn next_event_before(
            &mut self,
            _deadline: Instant,
            cancel: &CancelToken,
        ) -> GpioResult<Option<PinEvent>> {
            loop {
                cancel.checkpoint()?;
                match self.steps.pop_front() {
                    Some(Step::Edge(event)) => return Ok(Some(event)),
                    Some(Step::Quiet) | None => return Ok(None),
                    Some(Step::Cancel(token)) => token.cancel(),
                }
            }
        }
    }

    fn rising(input: usize, output: usize) -> Step {
        Step::Edge(PinEvent {
            input,
            output,
            edge: Edge::Rising,
        })
    }

    fn falling(input: usize, output: usize) -> Step {
        Step::Edge(PinEvent {
            input,
            output,
            edge: Edge::Falling,
        })
    }

    fn map_4x4() -> KeyMap {
        KeyMap::new(vec![
            vec!['1', '2', '3', 'A'],
            vec!['4', '5', '6', 'B'],
            vec!['7', '8', '9', 'C'],
            vec!['*', '0', '#', 'D'],
        ])
        .unwrap()
    }

    fn keyboard(steps: Vec<Step>) -> MatrixKeyboard<ScriptedSource> {
        MatrixKeyboard::new(ScriptedSource::new(4, 4, steps), map_4x4()).unwrap()
    }

    #[test]
    fn key_map_rejects_empty_table() {
        assert!(matches!(KeyMap::new(vec![]), Err(GpioError::Config(_))));
        assert!(matches!(
            KeyMap::new(vec![vec![], vec![]]),
            Err(GpioError::Config(_))
        ));
    }

    #[test]
    fn key_map_rejects_ragged_table() {
        let ragged = vec![vec!['1', '2'], vec!['3']];
        assert!(matches!(KeyMap::new(ragged), Err(GpioError::Config(_))));
    }

    #[test]
    fn construction_rejects_row_count_mismatch() {
        let source = ScriptedSource::new(3, 4, vec![]);
        assert!(matches!(
            MatrixKeyboard::new(source, map_4x4()),
            Err(GpioError::Config(_))
        ));
    }

    #[test]
    fn construction_rejects_column_count_mismatch() {
        let source = ScriptedSource::new(4, 3, vec![]);
        assert!(matches!(
            MatrixKeyboard::new(source, map_4x4()),
            Err(GpioError::Config(_))
        ));
    }

    #[test]
    fn resolves_key_by_column_elimination() {
        // Press at (row 2, col 1); every other column echoes a rising edge
        // within the window and gets eliminated, leaving column 1.
        let mut keyboard = keyboard(vec![
            rising(2, 1),
            rising(0, 0),
            rising(0, 2),
            rising(0, 3),
        ]);

        let key = keyboard.read_key(&CancelToken::new()).unwrap();
        assert_eq!(key, '8');
    }

    #[test]
    fn trigger_column_echoes_are_no_ops() {
        let mut keyboard = keyboard(vec![
            rising(2, 1),
            rising(0, 1), // repeat of the trigger column, eliminates nothing
            rising(0, 0),
            rising(0, 2),
            rising(0, 3),
        ]);

        assert_eq!(keyboard.read_key(&CancelToken::new()).unwrap(), '8');
    }

    #[test]
    fn falling_edges_are_ignored() {
        let mut keyboard = keyboard(vec![
            falling(1, 2), // stale release before the press, skipped
            rising(2, 1),
            falling(0, 0), // release inside the window, eliminates nothing
            rising(0, 0),
            rising(0, 2),
            rising(0, 3),
        ]);

        assert_eq!(keyboard.read_key(&CancelToken::new()).unwrap(), '8');
    }

    #[test]
    fn window_expiry_retries_silently() {
        // First attempt starves inside the window; the read call must not
        // surface anything and resolves on the second press instead.
        let mut keyboard = keyboard(vec![
            rising(2, 1),
            Step::Quiet,
            rising(1, 2),
            rising(0, 0),
            rising(0, 1),
            rising(0, 3),
        ]);

        assert_eq!(keyboard.read_key(&CancelToken::new()).unwrap(), '6');
    }

    #[test]
    fn partial_elimination_then_expiry_retries() {
        let mut keyboard = keyboard(vec![
            rising(2, 1),
            rising(0, 0), // only one of three candidates eliminated
            Step::Quiet,
            rising(3, 3),
            rising(0, 0),
            rising(0, 1),
            rising(0, 2),
        ]);

        assert_eq!(keyboard.read_key(&CancelToken::new()).unwrap(), 'D');
    }

    #[test]
    fn single_column_resolves_immediately() {
        let key_map = KeyMap::new(vec![vec!['x'], vec!['y']]).unwrap();
        let source = ScriptedSource::new(2, 1, vec![rising(1, 0)]);
        let mut keyboard = MatrixKeyboard::new(source, key_map).unwrap();

        assert_eq!(keyboard.read_key(&CancelToken::new()).unwrap(), 'y');
    }

    #[test]
    fn cancellation_while_awaiting_edge() {
        let mut keyboard = keyboard(vec![rising(2, 1)]);

        let token = CancelToken::new();
        token.cancel();

        assert_eq!(keyboard.read_key(&token), Err(GpioError::Cancelled));
    }

    #[test]
    fn cancellation_during_disambiguation() {
        let token = CancelToken::new();
        let mut keyboard = keyboard(vec![
            rising(2, 1),
            rising(0, 0),
            Step::Cancel(token.clone()),
            rising(0, 2),
            rising(0, 3),
        ]);

        assert_eq!(keyboard.read_key(&token), Err(GpioError::Cancelled));
    }

    proptest! {
        #[test]
        fn rectangular_maps_construct(rows in 1usize..8, cols in 1usize..8) {
            let map = KeyMap::new(vec![vec!['x'; cols]; rows]).unwrap();
            prop_assert_eq!(map.rows(), rows);
            prop_assert_eq!(map.cols(), cols);
        }

        #[test]
        fn mismatched_dimensions_never_construct(
            rows in 1usize..8,
            cols in 1usize..8,
            row_skew in 0usize..3,
            col_skew in 0usize..3,
        ) {
            prop_assume!(row_skew != 0 || col_skew != 0);

            let map = KeyMap::new(vec![vec!['x'; cols]; rows]).unwrap();
            let source = ScriptedSource::new(rows + row_skew, cols + col_skew, vec![]);
            prop_assert!(matches!(
                MatrixKeyboard::new(source, map),
                Err(GpioError::Config(_))
            ));
        }
    }
}
