use crate::document::{Document, Row};
use crate::errors::FlowdeckError;
use crate::render::render_frame;
use crossterm::cursor::MoveUp;
use crossterm::terminal::{Clear, ClearType};
use crossterm::QueueableCommand;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

const TICK_INTERVAL: Duration = Duration::from_millis(100);
const FALLBACK_WIDTH: u16 = 100;

pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
    fn sleep_until(&self, deadline: SystemTime) -> Result<(), FlowdeckError>;
}

pub struct ProductionClock;

impl Clock for ProductionClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }

    fn sleep_until(&self, deadline: SystemTime) -> Result<(), FlowdeckError> {
        let now = SystemTime::now();
        if let Ok(duration) = deadline.duration_since(now) {
            thread::sleep(duration);
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct FakeClock {
    now: Arc<Mutex<SystemTime>>,
    sleeps: Arc<Mutex<Vec<SystemTime>>>,
}

impl FakeClock {
    pub fn new(now: SystemTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
            sleeps: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn sleeps(&self) -> Vec<SystemTime> {
        self.sleeps.lock().expect("sleep lock").clone()
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("clock lock");
        *now += by;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new(SystemTime::UNIX_EPOCH)
    }
}

impl Clock for FakeClock {
    fn now(&self) -> SystemTime {
        *self.now.lock().expect("clock lock")
    }

    fn sleep_until(&self, deadline: SystemTime) -> Result<(), FlowdeckError> {
        self.sleeps.lock().expect("sleep lock").push(deadline);
        *self.now.lock().expect("clock lock") = deadline;
        Ok(())
    }
}

/// The rendering surface the presenter pushes documents to. `append` adds a
/// live document, `update` replaces it wholesale, `remove` takes it off the
/// screen, and `log` prints one discrete line above the live region.
pub trait Surface: Send + Sync {
    fn append(&self, id: &str, document: Document) -> Result<(), FlowdeckError>;
    fn update(&self, id: &str, document: Document) -> Result<(), FlowdeckError>;
    fn remove(&self, id: &str) -> Result<(), FlowdeckError>;
    fn log(&self, row: Row) -> Result<(), FlowdeckError>;
    fn start(&self) -> Result<(), FlowdeckError>;
    fn stop(&self) -> Result<(), FlowdeckError>;
}

struct LiveState {
    documents: Vec<(String, Document)>,
    tick: usize,
    last_height: u16,
}

/// Production surface: rasterizes the live documents and redraws them in
/// place on stdout. A ticker thread owned by the surface advances spinners
/// and timers between events.
pub struct TerminalSurface {
    clock: Arc<dyn Clock>,
    state: Arc<Mutex<LiveState>>,
    running: Arc<AtomicBool>,
    ticker: Mutex<Option<JoinHandle<()>>>,
    width: u16,
}

impl TerminalSurface {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let width = crossterm::terminal::size()
            .map(|(w, _)| w)
            .unwrap_or(FALLBACK_WIDTH);
        Self {
            clock,
            state: Arc::new(Mutex::new(LiveState {
                documents: Vec::new(),
                tick: 0,
                last_height: 0,
            })),
            running: Arc::new(AtomicBool::new(false)),
            ticker: Mutex::new(None),
            width,
        }
    }

    fn clear_region(state: &mut LiveState, out: &mut impl Write) -> Result<(), FlowdeckError> {
        if state.last_height > 0 {
            out.queue(MoveUp(state.last_height))
                .map_err(|e| FlowdeckError::Surface(e.to_string()))?;
            out.queue(Clear(ClearType::FromCursorDown))
                .map_err(|e| FlowdeckError::Surface(e.to_string()))?;
            state.last_height = 0;
        }
        Ok(())
    }

    fn redraw(
        state: &mut LiveState,
        clock: &Arc<dyn Clock>,
        width: u16,
    ) -> Result<(), FlowdeckError> {
        let mut out = io::stdout();
        Self::clear_region(state, &mut out)?;

        if !state.documents.is_empty() {
            let documents = state
                .documents
                .iter()
                .map(|(_, document)| document)
                .collect::<Vec<_>>();
            let frame = render_frame(&documents, width, clock.now(), state.tick)?;
            write!(out, "{frame}").map_err(|e| FlowdeckError::Io(e.to_string()))?;
            state.last_height = frame.lines().count() as u16;
        }

        out.flush().map_err(|e| FlowdeckError::Io(e.to_string()))
    }

    fn upsert(&self, id: &str, document: Document) -> Result<(), FlowdeckError> {
        let mut state = self.state.lock().expect("surface lock");
        match state.documents.iter_mut().find(|(known, _)| known == id) {
            Some(slot) => slot.1 = document,
            None => state.documents.push((id.to_string(), document)),
        }
        Self::redraw(&mut state, &self.clock, self.width)
    }
}

impl Surface for TerminalSurface {
    fn append(&self, id: &str, document: Document) -> Result<(), FlowdeckError> {
        self.upsert(id, document)
    }

    fn update(&self, id: &str, document: Document) -> Result<(), FlowdeckError> {
        self.upsert(id, document)
    }

    fn remove(&self, id: &str) -> Result<(), FlowdeckError> {
        let mut state = self.state.lock().expect("surface lock");
        state.documents.retain(|(known, _)| known != id);
        Self::redraw(&mut state, &self.clock, self.width)
    }

    fn log(&self, row: Row) -> Result<(), FlowdeckError> {
        let mut state = self.state.lock().expect("surface lock");
        let mut out = io::stdout();
        Self::clear_region(&mut state, &mut out)?;

        let document = Document { rows: vec![row] };
        let frame = render_frame(&[&document], self.width, self.clock.now(), state.tick)?;
        let line = frame.lines().next().unwrap_or_default().trim_end();
        writeln!(out, "{line}").map_err(|e| FlowdeckError::Io(e.to_string()))?;

        Self::redraw(&mut state, &self.clock, self.width)
    }

    fn start(&self) -> Result<(), FlowdeckError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let state = Arc::clone(&self.state);
        let clock = Arc::clone(&self.clock);
        let running = Arc::clone(&self.running);
        let width = self.width;
        let handle = thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                thread::sleep(TICK_INTERVAL);
                let mut state = state.lock().expect("surface lock");
                state.tick = state.tick.wrapping_add(1);
                let _ = Self::redraw(&mut state, &clock, width);
            }
        });
        *self.ticker.lock().expect("ticker lock") = Some(handle);
        Ok(())
    }

    fn stop(&self) -> Result<(), FlowdeckError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.ticker.lock().expect("ticker lock").take() {
            handle
                .join()
                .map_err(|_| FlowdeckError::Surface("ticker thread panicked".to_string()))?;
        }
        Ok(())
    }
}

/// Recording surface for tests.
#[derive(Default, Clone)]
pub struct FakeSurface {
    appends: Arc<Mutex<Vec<(String, Document)>>>,
    updates: Arc<Mutex<Vec<(String, Document)>>>,
    removes: Arc<Mutex<Vec<String>>>,
    logs: Arc<Mutex<Vec<Row>>>,
    starts: Arc<Mutex<usize>>,
    stops: Arc<Mutex<usize>>,
}

impl FakeSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn appends(&self) -> Vec<(String, Document)> {
        self.appends.lock().expect("appends lock").clone()
    }

    pub fn updates(&self) -> Vec<(String, Document)> {
        self.updates.lock().expect("updates lock").clone()
    }

    pub fn removes(&self) -> Vec<String> {
        self.removes.lock().expect("removes lock").clone()
    }

    pub fn logs(&self) -> Vec<Row> {
        self.logs.lock().expect("logs lock").clone()
    }

    pub fn starts(&self) -> usize {
        *self.starts.lock().expect("starts lock")
    }

    pub fn stops(&self) -> usize {
        *self.stops.lock().expect("stops lock")
    }
}

impl Surface for FakeSurface {
    fn append(&self, id: &str, document: Document) -> Result<(), FlowdeckError> {
        self.appends
            .lock()
            .expect("appends lock")
            .push((id.to_string(), document));
        Ok(())
    }

    fn update(&self, id: &str, document: Document) -> Result<(), FlowdeckError> {
        self.updates
            .lock()
            .expect("updates lock")
            .push((id.to_string(), document));
        Ok(())
    }

    fn remove(&self, id: &str) -> Result<(), FlowdeckError> {
        self.removes
            .lock()
            .expect("removes lock")
            .push(id.to_string());
        Ok(())
    }

    fn log(&self, row: Row) -> Result<(), FlowdeckError> {
        self.logs.lock().expect("logs lock").push(row);
        Ok(())
    }

    fn start(&self) -> Result<(), FlowdeckError> {
        *self.starts.lock().expect("starts lock") += 1;
        Ok(())
    }

    fn stop(&self) -> Result<(), FlowdeckError> {
        *self.stops.lock().expect("stops lock") += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Clock, FakeClock, FakeSurface, Surface};
    use crate::document::{Block, Document, Row};
    use std::time::{Duration, SystemTime};

    #[test]
    fn fake_clock_records_sleeps_and_advances() {
        let clock = FakeClock::default();
        let deadline = SystemTime::UNIX_EPOCH + Duration::from_secs(3);
        clock.sleep_until(deadline).expect("sleep");
        assert_eq!(clock.sleeps(), vec![deadline]);
        assert_eq!(clock.now(), deadline);
    }

    #[test]
    fn fake_surface_records_every_call() {
        let surface = FakeSurface::new();
        let doc = Document {
            rows: vec![Row::from_blocks(vec![Block::text("x")])],
        };
        surface.append("workflow", doc.clone()).expect("append");
        surface.update("workflow", doc).expect("update");
        surface
            .log(Row::from_blocks(vec![Block::text("line")]))
            .expect("log");
        surface.remove("workflow").expect("remove");
        surface.start().expect("start");
        surface.stop().expect("stop");

        assert_eq!(surface.appends().len(), 1);
        assert_eq!(surface.updates().len(), 1);
        assert_eq!(surface.logs().len(), 1);
        assert_eq!(surface.removes(), vec!["workflow".to_string()]);
        assert_eq!(surface.starts(), 1);
        assert_eq!(surface.stops(), 1);
    }
}
