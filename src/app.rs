use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame, Terminal,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::backend::{Backend, TextAnalysisResult};
use crate::config::Config;
use crate::feed::session::{SessionState, SessionUpdate, StreamSession};
use crate::feed::timeline::Timeline;
use crate::ui::widgets::{AnalysisPanel, StreamInput, StreamPanel};

/// Which card has focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Analysis,
    Stream,
}

/// One active streaming query from the app's side: the update channel plus
/// the session handle. The handle is taken when a stop is dispatched; the
/// channel keeps draining until the terminal update arrives.
struct ActiveSession {
    updates: mpsc::Receiver<SessionUpdate>,
    control: Option<StreamSession>,
}

/// What woke the event loop up.
enum Step {
    Input(Option<Event>),
    Session(Option<SessionUpdate>),
    Analysis(TextAnalysisResult),
    Tick,
}

pub struct App {
    backend: Arc<dyn Backend>,
    config: Config,
    focus: Focus,
    analysis: AnalysisPanel,
    stream: StreamPanel,
    timeline: Timeline,
    session: Option<ActiveSession>,
    pending_analysis: Option<JoinHandle<TextAnalysisResult>>,
    should_quit: bool,
}

impl App {
    pub fn new(config: Config, backend: Arc<dyn Backend>) -> Self {
        let stream = StreamPanel::new(
            config.keyword.clone(),
            config.time_window_secs,
            config.display_window,
        );
        Self {
            backend,
            config,
            focus: Focus::Analysis,
            analysis: AnalysisPanel::new(),
            stream,
            timeline: Timeline::new(),
            session: None,
            pending_analysis: None,
            should_quit: false,
        }
    }

    pub async fn run<B: ratatui::backend::Backend>(
        mut self,
        terminal: &mut Terminal<B>,
    ) -> Result<()> {
        let (input_tx, mut input_rx) = mpsc::channel(32);
        spawn_input_thread(input_tx);
        let mut tick = tokio::time::interval(Duration::from_millis(self.config.tick_ms));

        while !self.should_quit {
            terminal.draw(|frame| self.draw(frame))?;

            let step = tokio::select! {
                event = input_rx.recv() => Step::Input(event),
                update = Self::next_session_update(&mut self.session) => Step::Session(update),
                result = Self::next_analysis(&mut self.pending_analysis) => Step::Analysis(result),
                _ = tick.tick() => Step::Tick,
            };

            match step {
                Step::Input(None) => break, // input thread gone
                Step::Input(Some(event)) => self.on_input(event),
                Step::Session(update) => self.on_session_update(update),
                Step::Analysis(result) => {
                    self.pending_analysis = None;
                    self.analysis.set_result(result);
                }
                Step::Tick => {}
            }
        }

        // Abandon an in-flight stream on the way out; shutdown sends no
        // stop notification.
        if let Some(mut active) = self.session.take() {
            if let Some(control) = active.control.take() {
                control.abort();
            }
        }
        Ok(())
    }

    /// Next update from the active session; pends forever while there is
    /// none, so the select loop simply ignores this branch then.
    async fn next_session_update(session: &mut Option<ActiveSession>) -> Option<SessionUpdate> {
        match session {
            Some(active) => active.updates.recv().await,
            None => std::future::pending().await,
        }
    }

    async fn next_analysis(
        pending: &mut Option<JoinHandle<TextAnalysisResult>>,
    ) -> TextAnalysisResult {
        match pending {
            Some(handle) => match handle.await {
                Ok(result) => result,
                Err(err) => TextAnalysisResult::from_error(format!("analysis task failed: {err}")),
            },
            None => std::future::pending().await,
        }
    }

    fn on_input(&mut self, event: Event) {
        if let Event::Key(key) = event {
            if key.kind == KeyEventKind::Press {
                self.on_key(key);
            }
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        // An editing field captures everything except its exit keys.
        if self.focus == Focus::Analysis && self.analysis.is_editing() {
            match key.code {
                KeyCode::Esc => self.analysis.stop_editing(),
                KeyCode::Enter => {
                    self.analysis.stop_editing();
                    self.submit_analysis();
                }
                KeyCode::Backspace => self.analysis.delete_char(),
                KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                    self.analysis.add_char(c)
                }
                _ => {}
            }
            return;
        }
        if self.focus == Focus::Stream && self.stream.is_editing() {
            match key.code {
                KeyCode::Esc | KeyCode::Enter => self.stream.finish_editing(),
                KeyCode::Backspace => self.stream.delete_char(),
                KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                    self.stream.add_char(c)
                }
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true
            }
            KeyCode::Tab => {
                self.focus = match self.focus {
                    Focus::Analysis => Focus::Stream,
                    Focus::Stream => Focus::Analysis,
                }
            }
            _ => match self.focus {
                Focus::Analysis => self.on_analysis_key(key),
                Focus::Stream => self.on_stream_key(key),
            },
        }
    }

    fn on_analysis_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('e') | KeyCode::Char('i') => self.analysis.start_editing(),
            KeyCode::Enter => self.submit_analysis(),
            _ => {}
        }
    }

    fn on_stream_key(&mut self, key: KeyEvent) {
        match key.code {
            // Controls are frozen while a stream is active.
            KeyCode::Char('k') if !self.streaming_active() => {
                self.stream.start_editing(StreamInput::Keyword)
            }
            KeyCode::Char('w') if !self.streaming_active() => {
                self.stream.start_editing(StreamInput::TimeWindow)
            }
            KeyCode::Char('s') | KeyCode::Enter => self.toggle_stream(),
            _ => {}
        }
    }

    fn streaming_active(&self) -> bool {
        matches!(
            self.stream.state,
            SessionState::Streaming | SessionState::Stopping
        )
    }

    fn toggle_stream(&mut self) {
        if self.streaming_active() {
            self.stop_stream();
        } else {
            self.start_stream();
        }
    }

    /// Dispatch one analysis request. One at a time and never a blank one;
    /// the client itself enforces neither, so the guard lives here.
    fn submit_analysis(&mut self) {
        if self.pending_analysis.is_some() {
            return;
        }
        if let Some(text) = self.analysis.submission() {
            self.analysis.set_loading();
            let backend = self.backend.clone();
            self.pending_analysis =
                Some(tokio::spawn(async move { backend.analyze(&text).await }));
        }
    }

    /// Open a new session. One at a time: a prior session must have fully
    /// wound down (terminal update received) first, so timelines, tokens
    /// and channels are never shared between sessions.
    fn start_stream(&mut self) {
        if self.session.is_some() {
            return;
        }
        self.timeline = Timeline::new();
        self.stream.error = None;
        let (control, updates) = StreamSession::open(
            self.backend.clone(),
            &self.stream.keyword,
            self.stream.time_window_secs,
        );
        self.session = Some(ActiveSession {
            updates,
            control: Some(control),
        });
        self.stream.state = SessionState::Streaming;
    }

    fn stop_stream(&mut self) {
        if let Some(active) = self.session.as_mut() {
            if let Some(control) = active.control.take() {
                self.stream.state = SessionState::Stopping;
                tokio::spawn(control.stop());
            }
        }
    }

    fn on_session_update(&mut self, update: Option<SessionUpdate>) {
        match update {
            Some(SessionUpdate::Event(event)) => self.timeline.append(event),
            Some(SessionUpdate::Completed) | Some(SessionUpdate::Cancelled) => {
                self.finish_session(None)
            }
            Some(SessionUpdate::Failed(reason)) => self.finish_session(Some(reason)),
            None => {
                warn!("session channel closed without a terminal update");
                self.finish_session(Some("stream worker vanished".to_string()));
            }
        }
    }

    fn finish_session(&mut self, error: Option<String>) {
        self.session = None;
        self.stream.state = SessionState::Stopped;
        self.stream.error = error;
    }

    fn draw(&self, frame: &mut Frame) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2),
                Constraint::Length(9),
                Constraint::Min(8),
                Constraint::Length(1),
            ])
            .split(frame.area());

        let header = Paragraph::new(vec![
            Line::from(Span::styled(
                "Sentiment Analyzer",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                "Real-time news sentiment analysis",
                Style::default().fg(Color::DarkGray),
            )),
        ]);
        frame.render_widget(header, rows[0]);

        self.analysis
            .render(frame, rows[1], self.focus == Focus::Analysis);
        self.stream
            .render(frame, rows[2], self.focus == Focus::Stream, &self.timeline);

        frame.render_widget(
            Paragraph::new(Span::styled(
                "Tab switch card | q quit",
                Style::default().fg(Color::DarkGray),
            )),
            rows[3],
        );
    }
}

/// Crossterm's event source is blocking, so it gets a thread of its own
/// feeding the async loop.
fn spawn_input_thread(tx: mpsc::Sender<Event>) {
    std::thread::spawn(move || loop {
        if tx.is_closed() {
            break;
        }
        match crossterm::event::poll(Duration::from_millis(200)) {
            Ok(true) => match crossterm::event::read() {
                Ok(event) => {
                    if tx.blocking_send(event).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            },
            Ok(false) => {}
            Err(_) => break,
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ChunkStream;
    use anyhow::Result;
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures::stream;
    use futures::StreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum StreamPlan {
        /// Serve these chunks, then end the stream (backend closed it).
        Complete(Vec<&'static str>),
        /// Serve these chunks, then hold the stream open forever.
        Stall(Vec<&'static str>),
    }

    struct StubBackend {
        plan: StreamPlan,
        opens: AtomicUsize,
        analyzes: AtomicUsize,
        stops: AtomicUsize,
    }

    impl StubBackend {
        fn new(plan: StreamPlan) -> Arc<Self> {
            Arc::new(Self {
                plan,
                opens: AtomicUsize::new(0),
                analyzes: AtomicUsize::new(0),
                stops: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Backend for StubBackend {
        async fn analyze(&self, _text: &str) -> TextAnalysisResult {
            self.analyzes.fetch_add(1, Ordering::SeqCst);
            TextAnalysisResult::from_body("Score is:4.2 (positive)".to_string())
        }

        async fn open_sentiment_stream(
            &self,
            _keyword: &str,
            _time_window_secs: u64,
        ) -> Result<ChunkStream> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            let items: Vec<Result<Bytes>> = match &self.plan {
                StreamPlan::Complete(parts) | StreamPlan::Stall(parts) => parts
                    .iter()
                    .map(|p| Ok(Bytes::copy_from_slice(p.as_bytes())))
                    .collect(),
            };
            match &self.plan {
                StreamPlan::Complete(_) => Ok(Box::pin(stream::iter(items))),
                StreamPlan::Stall(_) => Ok(Box::pin(stream::iter(items).chain(stream::pending()))),
            }
        }

        async fn notify_stop(&self) -> Result<()> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn app_with(stub: Arc<StubBackend>) -> App {
        App::new(Config::default(), stub)
    }

    async fn drain_session(app: &mut App) {
        while app.session.is_some() {
            let update = App::next_session_update(&mut app.session).await;
            app.on_session_update(update);
        }
    }

    async fn wait_until(what: &str, condition: impl Fn() -> bool) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {what}"));
    }

    #[tokio::test]
    async fn test_natural_end_reaches_stopped_without_notification() {
        let stub = StubBackend::new(StreamPlan::Complete(vec![
            "12 messages, sentiment = 3.50<br>",
            "7 mess",
            "ages, sentiment = 2.10<br>not-a-record<br>",
        ]));
        let mut app = app_with(stub.clone());

        app.start_stream();
        assert_eq!(app.stream.state, SessionState::Streaming);
        drain_session(&mut app).await;

        assert_eq!(app.stream.state, SessionState::Stopped);
        assert!(app.stream.error.is_none());
        assert_eq!(app.timeline.len(), 2);
        assert!((app.timeline.average().unwrap() - 2.80).abs() < 1e-9);
        assert_eq!(stub.stops.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stop_notifies_exactly_once_and_nothing_lands_after() {
        let stub = StubBackend::new(StreamPlan::Stall(vec![
            "5 messages, sentiment = 4.00<br>",
        ]));
        let mut app = app_with(stub.clone());

        app.start_stream();
        let update = App::next_session_update(&mut app.session).await;
        app.on_session_update(update);
        assert_eq!(app.timeline.len(), 1);

        app.stop_stream();
        assert_eq!(app.stream.state, SessionState::Stopping);
        drain_session(&mut app).await;

        assert_eq!(app.stream.state, SessionState::Stopped);
        assert!(app.stream.error.is_none(), "cancellation is not an error");
        assert_eq!(app.timeline.len(), 1);

        wait_until("stop notification", || {
            stub.stops.load(Ordering::SeqCst) == 1
        })
        .await;

        // A second stop has nothing to act on.
        app.stop_stream();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(stub.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_second_start_is_ignored_while_active() {
        let stub = StubBackend::new(StreamPlan::Stall(vec![]));
        let mut app = app_with(stub.clone());

        app.start_stream();
        wait_until("stream open", || stub.opens.load(Ordering::SeqCst) == 1).await;
        app.start_stream();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(stub.opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_new_session_gets_a_fresh_timeline() {
        let stub = StubBackend::new(StreamPlan::Complete(vec![
            "1 messages, sentiment = 2.00<br>",
        ]));
        let mut app = app_with(stub.clone());

        app.start_stream();
        drain_session(&mut app).await;
        assert_eq!(app.timeline.len(), 1);

        app.start_stream();
        assert!(app.timeline.is_empty());
        drain_session(&mut app).await;
        assert_eq!(app.timeline.len(), 1);
        assert_eq!(stub.opens.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_analysis_runs_one_at_a_time() {
        let stub = StubBackend::new(StreamPlan::Complete(vec![]));
        let mut app = app_with(stub.clone());

        for c in "I love this product!".chars() {
            app.analysis.add_char(c);
        }
        app.submit_analysis();
        assert!(app.pending_analysis.is_some());
        app.submit_analysis(); // trigger disabled while one is outstanding
        let result = App::next_analysis(&mut app.pending_analysis).await;
        app.pending_analysis = None;
        assert_eq!(result.score, Some(4.2));
        assert_eq!(stub.analyzes.load(Ordering::SeqCst), 1);
    }
}
