//! The session channel: one transport, one session task.
//!
//! [`SessionChannel`] is the handle UI code holds. `connect` opens the
//! transport and spawns a task that owns everything mutable: the transport,
//! the liveness ping, the round scheduler and the event router with its
//! store. The handle talks to the task over a command queue and reads
//! state back through `watch` channels, so every reaction runs one at a
//! time on the task and the store has a single writer.

use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::models::ItemKind;
use crate::protocol::{self, ClientMessage};

use super::events::{EventBus, SessionEvent, Subscription};
use super::router::{Directive, EventRouter};
use super::scheduler::{sleep_until_opt, RoundPhase, RoundScheduler, TickOutcome};
use super::state::{SessionIdentity, SessionSnapshot, SessionStore};
use super::transport::{CloseCode, Connector, Transport, TransportEvent, WebSocketConnector};

/// Lifecycle of the channel's transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Open,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Player actions forwarded to the session task.
#[derive(Debug)]
enum Command {
    Send(ClientMessage),
    Chat(String),
    SubmitAnswer(String),
    UseItem {
        item: ItemKind,
        target: Option<String>,
    },
}

/// The live task and the ways to reach it.
struct Link {
    commands: mpsc::UnboundedSender<Command>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

/// Client handle for one multiplayer quiz session.
pub struct SessionChannel<C: Connector = WebSocketConnector> {
    config: SessionConfig,
    connector: C,
    state: Arc<watch::Sender<ConnectionState>>,
    snapshots: Arc<watch::Sender<SessionSnapshot>>,
    events: EventBus,
    link: Option<Link>,
}

impl SessionChannel<WebSocketConnector> {
    /// A channel that talks WebSocket to `config.server_url`.
    pub fn websocket(config: SessionConfig) -> Self {
        Self::new(config, WebSocketConnector)
    }
}

impl<C: Connector> SessionChannel<C> {
    pub fn new(config: SessionConfig, connector: C) -> Self {
        let events = EventBus::new(config.event_capacity);
        Self {
            config,
            connector,
            state: Arc::new(watch::Sender::new(ConnectionState::Idle)),
            snapshots: Arc::new(watch::Sender::new(SessionSnapshot::default())),
            events,
            link: None,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Follow connection state changes.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Subscribe to outward events. Drop the handle to unsubscribe.
    pub fn subscribe(&self) -> Subscription {
        self.events.subscribe()
    }

    /// The latest published view of the session.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Follow snapshots as they are published.
    pub fn watch_snapshot(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.subscribe()
    }

    /// Open the session transport and start the session task.
    ///
    /// Rejected when the code or name is empty, or while a transport is
    /// already connecting or open. Reconnecting after a close is a fresh
    /// call to `connect`.
    pub async fn connect(
        &mut self,
        session_code: &str,
        player_name: &str,
        is_host: bool,
    ) -> Result<(), SessionError> {
        let session_code = session_code.trim();
        let player_name = player_name.trim();

        if session_code.is_empty() {
            warn!("connect rejected: empty session code");
            return Err(SessionError::MissingSessionCode);
        }
        if player_name.is_empty() {
            warn!(session = session_code, "connect rejected: empty player name");
            return Err(SessionError::MissingPlayerName);
        }

        let current = self.state();
        if matches!(current, ConnectionState::Connecting | ConnectionState::Open) {
            warn!(state = %current, session = session_code, "connect rejected: already connected");
            return Err(SessionError::AlreadyConnected(current));
        }

        // A previous task has already closed its transport; reap it.
        if let Some(stale) = self.link.take() {
            stale.task.abort();
        }

        let endpoint = self.config.endpoint(session_code, player_name);
        info!(url = endpoint.as_str(), is_host, "connecting to session");
        let mut pending = PendingOpen::begin(&self.state);

        let transport = match self.connector.open(&endpoint).await {
            Ok(transport) => transport,
            Err(e) => {
                error!(error = %e, url = endpoint.as_str(), "failed to open session transport");
                return Err(e.into());
            }
        };
        pending.opened();

        let identity = SessionIdentity {
            session_code: session_code.to_string(),
            player_name: player_name.to_string(),
            is_host,
        };
        let store = SessionStore::new(identity, self.config.chat_history);

        self.state.send_replace(ConnectionState::Open);
        info!(session = session_code, player = player_name, "session open");
        self.events.publish(SessionEvent::Connected);

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let task = SessionTask {
            transport,
            commands: commands_rx,
            shutdown: shutdown_rx,
            router: EventRouter::new(store, self.events.clone()),
            scheduler: RoundScheduler::new(
                self.config.round_seconds,
                self.config.notification_window,
            ),
            ping: ping_interval(&self.config),
            state: Arc::clone(&self.state),
            snapshots: Arc::clone(&self.snapshots),
            events: self.events.clone(),
            ended: false,
        };

        self.link = Some(Link {
            commands: commands_tx,
            shutdown: Some(shutdown_tx),
            task: tokio::spawn(task.run()),
        });
        Ok(())
    }

    /// Forward a raw protocol message. Dropped unless the session is open.
    pub fn send(&self, message: ClientMessage) {
        self.dispatch(Command::Send(message));
    }

    /// Send a chat line as the local player.
    pub fn send_chat(&self, text: impl Into<String>) {
        self.dispatch(Command::Chat(text.into()));
    }

    /// Answer the current question with one of its choice texts.
    pub fn submit_answer(&self, choice: impl Into<String>) {
        self.dispatch(Command::SubmitAnswer(choice.into()));
    }

    /// Use an item. Targeted kinds need another player's name.
    pub fn use_item(&self, item: ItemKind, target: Option<String>) {
        self.dispatch(Command::UseItem { item, target });
    }

    /// Ask the server to move on to the next question.
    pub fn request_next_question(&self) {
        self.send(ClientMessage::NextQuestion);
    }

    /// Close the transport and stop every timer. Safe to call in any state,
    /// any number of times.
    pub async fn disconnect(&mut self) {
        let Some(mut link) = self.link.take() else {
            debug!(state = %self.state(), "disconnect with no session task");
            if self.state() == ConnectionState::Connecting {
                self.state.send_replace(ConnectionState::Closed);
            }
            return;
        };

        if let Some(shutdown) = link.shutdown.take() {
            // The task may already be gone after a remote close.
            let _ = shutdown.send(());
        }

        match tokio::time::timeout(self.config.shutdown_timeout, &mut link.task).await {
            Ok(Ok(())) => debug!("session task finished"),
            Ok(Err(e)) => warn!(error = %e, "session task failed"),
            Err(_) => {
                warn!(
                    timeout_ms = self.config.shutdown_timeout.as_millis() as u64,
                    "session task did not stop in time, aborting"
                );
                link.task.abort();
            }
        }

        if self.state() != ConnectionState::Closed {
            self.state.send_replace(ConnectionState::Closed);
        }
    }

    fn dispatch(&self, command: Command) {
        let state = self.state();
        let link = self.link.as_ref().filter(|_| state == ConnectionState::Open);
        let Some(link) = link else {
            warn!(%state, ?command, "session not open, dropping outbound action");
            return;
        };
        if link.commands.send(command).is_err() {
            warn!("session task gone, dropping outbound action");
        }
    }
}

impl<C: Connector> Drop for SessionChannel<C> {
    fn drop(&mut self) {
        if let Some(link) = self.link.take() {
            link.task.abort();
        }
    }
}

/// Holds the channel in `Connecting` while a transport is being opened.
/// Falls back to `Closed` unless the open completed, including when the
/// `connect` future is dropped mid-open.
struct PendingOpen<'a> {
    state: &'a watch::Sender<ConnectionState>,
    opened: bool,
}

impl<'a> PendingOpen<'a> {
    fn begin(state: &'a watch::Sender<ConnectionState>) -> Self {
        state.send_replace(ConnectionState::Connecting);
        Self {
            state,
            opened: false,
        }
    }

    fn opened(&mut self) {
        self.opened = true;
    }
}

impl Drop for PendingOpen<'_> {
    fn drop(&mut self) {
        if !self.opened && *self.state.borrow() == ConnectionState::Connecting {
            warn!("session open abandoned");
            self.state.send_replace(ConnectionState::Closed);
        }
    }
}

fn ping_interval(config: &SessionConfig) -> Interval {
    let mut ping = interval_at(
        Instant::now() + config.ping_interval,
        config.ping_interval,
    );
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ping
}

/// Everything mutable about one open session.
struct SessionTask<T: Transport> {
    transport: T,
    commands: mpsc::UnboundedReceiver<Command>,
    shutdown: oneshot::Receiver<()>,
    router: EventRouter,
    scheduler: RoundScheduler,
    ping: Interval,
    state: Arc<watch::Sender<ConnectionState>>,
    snapshots: Arc<watch::Sender<SessionSnapshot>>,
    events: EventBus,
    /// `SessionEnded` has been published for this session.
    ended: bool,
}

impl<T: Transport> SessionTask<T> {
    async fn run(mut self) {
        self.publish_snapshot();

        loop {
            let notification_deadline = self.scheduler.next_notification_deadline();

            let flow = tokio::select! {
                _ = &mut self.shutdown => {
                    self.close_locally().await;
                    ControlFlow::Break(())
                }
                command = self.commands.recv() => match command {
                    Some(command) => {
                        self.handle_command(command).await;
                        ControlFlow::Continue(())
                    }
                    None => {
                        self.close_locally().await;
                        ControlFlow::Break(())
                    }
                },
                event = self.transport.recv() => self.handle_transport(event).await,
                _ = self.ping.tick() => {
                    self.send_ping().await;
                    ControlFlow::Continue(())
                }
                _ = self.scheduler.next_tick() => {
                    self.handle_round_tick().await;
                    ControlFlow::Continue(())
                }
                _ = sleep_until_opt(notification_deadline) => {
                    let expired = self.scheduler.expire_notifications(Instant::now());
                    debug!(expired, "notifications expired");
                    ControlFlow::Continue(())
                }
            };

            self.publish_snapshot();
            if flow.is_break() {
                break;
            }
        }

        debug!("session task stopped");
    }

    async fn handle_transport(&mut self, event: TransportEvent) -> ControlFlow<()> {
        match event {
            TransportEvent::Message(text) => self.handle_frame(&text).await,
            TransportEvent::Error(e) => {
                // The close that follows decides the state.
                warn!(error = %e, "session transport error");
                ControlFlow::Continue(())
            }
            TransportEvent::Closed(code) => {
                self.handle_remote_close(code);
                ControlFlow::Break(())
            }
        }
    }

    async fn handle_frame(&mut self, text: &str) -> ControlFlow<()> {
        match self.router.route_frame(text) {
            None => {}
            Some(Directive::StartRound) => {
                self.scheduler.start_round();
                let remaining = self.scheduler.timer().duration();
                self.events.publish(SessionEvent::RoundTick { remaining });
            }
            Some(Directive::StopRound) => {
                debug!("round timer stopped");
                self.scheduler.stop_round();
            }
            Some(Directive::Notify(message)) => {
                info!(%message, "item notification");
                let item = self.scheduler.notify(message, Instant::now());
                self.events.publish(SessionEvent::Notification(item));
            }
            Some(Directive::EndSession) => {
                self.ended = true;
                self.close_locally().await;
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Send(message) => self.transmit(message).await,
            Command::Chat(text) => self.send_chat(text).await,
            Command::SubmitAnswer(choice) => self.submit_answer(choice).await,
            Command::UseItem { item, target } => self.use_item(item, target).await,
        }
    }

    async fn send_chat(&mut self, text: String) {
        let message = text.trim();
        if message.is_empty() {
            warn!("empty chat line not sent");
            return;
        }
        let Some(identity) = self.router.store().identity() else {
            warn!("chat dropped: session has no identity");
            return;
        };
        let outbound = ClientMessage::ChatMessage {
            username: identity.player_name.clone(),
            message: message.to_string(),
        };
        self.transmit(outbound).await;
    }

    async fn submit_answer(&mut self, choice: String) {
        let store = self.router.store();
        let Some(identity) = store.identity() else {
            warn!("answer dropped: session has no identity");
            return;
        };
        let Some(question) = store.question() else {
            warn!(%choice, "answer dropped: no active question");
            return;
        };
        if store.answer().submitted {
            warn!(index = question.index, "answer dropped: already submitted this round");
            return;
        }
        if !matches!(self.scheduler.timer().phase(), RoundPhase::Running { .. }) {
            warn!(index = question.index, "answer dropped: round is not running");
            return;
        }
        if !question.has_choice(&choice) {
            warn!(index = question.index, %choice, "answer dropped: not one of the choices");
            return;
        }

        let outbound = ClientMessage::AnswerSubmission {
            question_index: question.index,
            selected_answer: choice.clone(),
            session_code: identity.session_code.clone(),
        };
        info!(index = question.index, %choice, "submitting answer");
        self.router.record_answer(choice);
        self.transmit(outbound).await;
    }

    async fn use_item(&mut self, item: ItemKind, target: Option<String>) {
        let Some(identity) = self.router.store().identity() else {
            warn!(%item, "item use dropped: session has no identity");
            return;
        };

        let target = if item.requires_target() {
            let target = target
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty());
            match target {
                None => {
                    warn!(%item, "item use dropped: a target is required");
                    return;
                }
                Some(t) if t == identity.player_name => {
                    warn!(%item, "item use dropped: cannot target yourself");
                    return;
                }
                Some(t) => Some(t),
            }
        } else {
            None
        };

        let outbound = ClientMessage::ItemUse {
            session_code: identity.session_code.clone(),
            user: identity.player_name.clone(),
            item,
            target,
        };
        self.transmit(outbound).await;
    }

    async fn handle_round_tick(&mut self) {
        match self.scheduler.on_tick() {
            Some(TickOutcome::Counting { remaining }) => {
                self.events.publish(SessionEvent::RoundTick { remaining });
            }
            Some(TickOutcome::Expired) => {
                let question_index = self.router.store().question().map(|q| q.index);
                info!(index = ?question_index, "round expired, requesting next question");
                self.events.publish(SessionEvent::RoundTick { remaining: 0 });
                self.events
                    .publish(SessionEvent::RoundExpired { question_index });
                self.transmit(ClientMessage::NextQuestion).await;
            }
            None => {}
        }
    }

    async fn send_ping(&mut self) {
        if *self.state.borrow() != ConnectionState::Open {
            return;
        }
        debug!("sending liveness ping");
        self.transmit(ClientMessage::Ping).await;
    }

    async fn transmit(&mut self, message: ClientMessage) {
        let state = *self.state.borrow();
        if state != ConnectionState::Open {
            warn!(%state, ?message, "session not open, dropping outbound message");
            return;
        }
        let text = match protocol::encode(&message) {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, ?message, "failed to encode outbound message");
                return;
            }
        };
        if let Err(e) = self.transport.send(text).await {
            warn!(error = %e, "failed to send frame");
        }
    }

    /// We are leaving: close with the normal code.
    async fn close_locally(&mut self) {
        self.scheduler.shutdown();
        if let Err(e) = self.transport.close(CloseCode::NORMAL).await {
            debug!(error = %e, "transport close failed");
        }
        self.state.send_replace(ConnectionState::Closed);
        info!(code = %CloseCode::NORMAL, "session closed");
        self.events.publish(SessionEvent::Closed {
            code: CloseCode::NORMAL,
        });
    }

    /// The server or the network closed the connection.
    /// `SessionEnded`, when due, is published before `Closed`.
    fn handle_remote_close(&mut self, code: CloseCode) {
        self.scheduler.shutdown();
        self.state.send_replace(ConnectionState::Closed);

        if code.is_normal() {
            info!(%code, "session transport closed");
        } else {
            warn!(%code, "session transport closed abnormally");
            if !self.ended {
                self.ended = true;
                self.router
                    .end_session(format!("connection closed with code {code}"));
            }
        }

        self.events.publish(SessionEvent::Closed { code });
    }

    fn publish_snapshot(&self) {
        self.snapshots.send_replace(SessionSnapshot {
            session: self.router.store().clone(),
            round: self.scheduler.timer().phase(),
            notifications: self.scheduler.notifications().visible(),
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::client::state::SessionView;
    use crate::client::testing::{Remote, ScriptedConnector};

    fn channel() -> (SessionChannel<ScriptedConnector>, ScriptedConnector) {
        let connector = ScriptedConnector::default();
        let channel = SessionChannel::new(SessionConfig::default(), connector.clone());
        (channel, connector)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    async fn open(channel: &mut SessionChannel<ScriptedConnector>, connector: &ScriptedConnector) -> Remote {
        channel.connect("ABC123", "alice", false).await.unwrap();
        settle().await;
        connector.remote()
    }

    fn question(index: usize) -> serde_json::Value {
        json!({
            "type": "question_broadcast",
            "question_index": index,
            "question_data": {
                "question_text": format!("Question {index}"),
                "choices": [{"choice_text": "Red"}, {"choice_text": "Blue"}]
            }
        })
    }

    fn count_ended(events: &[SessionEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, SessionEvent::SessionEnded { .. }))
            .count()
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_rejects_missing_code_or_name() {
        let (mut channel, connector) = channel();

        let err = channel.connect("  ", "alice", false).await.unwrap_err();
        assert!(matches!(err, SessionError::MissingSessionCode));
        let err = channel.connect("ABC123", "", false).await.unwrap_err();
        assert!(matches!(err, SessionError::MissingPlayerName));

        assert_eq!(connector.opens(), 0);
        assert_eq!(channel.state(), ConnectionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_builds_endpoint() {
        let (mut channel, connector) = channel();
        open(&mut channel, &connector).await;
        assert_eq!(
            connector.endpoints(),
            vec!["ws://localhost:8000/ws/session/ABC123/?username=alice".to_string()]
        );
        let snapshot = channel.snapshot();
        let identity = snapshot.session.identity().unwrap();
        assert_eq!(identity.session_code, "ABC123");
        assert!(!identity.is_host);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_connect_opens_nothing() {
        let (mut channel, connector) = channel();
        let remote = open(&mut channel, &connector).await;

        let err = channel.connect("ABC123", "alice", false).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::AlreadyConnected(ConnectionState::Open)
        ));
        assert_eq!(connector.opens(), 1);

        tokio::time::sleep(Duration::from_secs(26)).await;
        assert_eq!(remote.count("ping"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pings_every_interval_while_open() {
        let (mut channel, connector) = channel();
        let remote = open(&mut channel, &connector).await;

        tokio::time::sleep(Duration::from_secs(24)).await;
        assert_eq!(remote.count("ping"), 0);
        tokio::time::sleep(Duration::from_secs(27)).await;
        assert_eq!(remote.count("ping"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_before_connect_is_safe() {
        let (mut channel, connector) = channel();
        channel.disconnect().await;
        channel.disconnect().await;
        assert_eq!(channel.state(), ConnectionState::Idle);
        assert_eq!(connector.opens(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_stops_ping_and_round_timer() {
        let (mut channel, connector) = channel();
        let mut events = channel.subscribe();
        let remote = open(&mut channel, &connector).await;
        remote.push(question(0));
        settle().await;

        channel.disconnect().await;
        channel.disconnect().await;
        assert_eq!(channel.state(), ConnectionState::Closed);
        assert_eq!(remote.closes(), vec![CloseCode::NORMAL]);

        tokio::time::sleep(Duration::from_secs(90)).await;
        assert_eq!(remote.count("ping"), 0);
        assert_eq!(remote.count("next_question"), 0);

        let events = events.drain();
        assert_eq!(count_ended(&events), 0);
        assert!(events.contains(&SessionEvent::Closed {
            code: CloseCode::NORMAL
        }));
        assert_eq!(channel.snapshot().round, RoundPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sends_dropped_when_not_open() {
        let (mut channel, connector) = channel();
        channel.send_chat("hello?");
        channel.request_next_question();

        let remote = open(&mut channel, &connector).await;
        channel.disconnect().await;
        channel.send_chat("anyone?");
        channel.send(ClientMessage::Ping);
        settle().await;

        assert!(remote.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_chat_is_trimmed_and_named() {
        let (mut channel, connector) = channel();
        let remote = open(&mut channel, &connector).await;

        channel.send_chat("   ");
        channel.send_chat("  hi all ");
        settle().await;

        assert_eq!(
            remote.sent(),
            vec![json!({"type": "chat_message", "username": "alice", "message": "hi all"})]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_question_resets_timer_and_answer() {
        let (mut channel, connector) = channel();
        let remote = open(&mut channel, &connector).await;

        remote.push(question(0));
        settle().await;
        assert_eq!(channel.snapshot().remaining(), Some(30));

        tokio::time::sleep(Duration::from_secs(10)).await;
        channel.submit_answer("Blue");
        settle().await;
        let snapshot = channel.snapshot();
        assert!(snapshot.session.answer().submitted);
        assert!(snapshot.remaining().unwrap() < 30);

        remote.push(question(1));
        settle().await;
        let snapshot = channel.snapshot();
        assert_eq!(snapshot.remaining(), Some(30));
        assert_eq!(snapshot.session.answer(), &Default::default());
        assert_eq!(snapshot.session.question().unwrap().index, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_sends_one_advance_even_after_answering() {
        let (mut channel, connector) = channel();
        let mut events = channel.subscribe();
        let remote = open(&mut channel, &connector).await;

        remote.push(question(0));
        settle().await;
        channel.submit_answer("Red");
        settle().await;

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(remote.count("next_question"), 1);
        assert_eq!(channel.snapshot().round, RoundPhase::Expired);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(remote.count("next_question"), 1);
        assert_eq!(remote.count("answer_submission"), 1);

        let expired: Vec<_> = events
            .drain()
            .into_iter()
            .filter(|e| matches!(e, SessionEvent::RoundExpired { .. }))
            .collect();
        assert_eq!(
            expired,
            vec![SessionEvent::RoundExpired {
                question_index: Some(0)
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_answer_rules() {
        let (mut channel, connector) = channel();
        let remote = open(&mut channel, &connector).await;

        channel.submit_answer("Red");
        settle().await;
        assert_eq!(remote.count("answer_submission"), 0);

        remote.push(question(2));
        settle().await;
        channel.submit_answer("Green");
        channel.submit_answer("Blue");
        channel.submit_answer("Red");
        settle().await;

        assert_eq!(
            remote.sent_of("answer_submission"),
            vec![json!({
                "type": "answer_submission",
                "questionIndex": 2,
                "selectedAnswer": "Blue",
                "sessionCode": "ABC123"
            })]
        );
        assert_eq!(
            channel.snapshot().session.answer().selected.as_deref(),
            Some("Blue")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_item_targets() {
        let (mut channel, connector) = channel();
        let remote = open(&mut channel, &connector).await;

        channel.use_item(ItemKind::Cannon, None);
        channel.use_item(ItemKind::Cannon, Some("alice".to_string()));
        channel.use_item(ItemKind::Torpedo, Some("bob".to_string()));
        channel.use_item(ItemKind::Shield, Some("bob".to_string()));
        settle().await;

        assert_eq!(
            remote.sent_of("item_use"),
            vec![
                json!({
                    "type": "item_use",
                    "sessionCode": "ABC123",
                    "user": "alice",
                    "item": "TORPEDO",
                    "target": "bob"
                }),
                json!({
                    "type": "item_use",
                    "sessionCode": "ABC123",
                    "user": "alice",
                    "item": "SHIELD",
                    "target": null
                }),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_game_end_stops_round() {
        let (mut channel, connector) = channel();
        let remote = open(&mut channel, &connector).await;

        remote.push(question(0));
        settle().await;
        remote.push(json!({
            "type": "game_ended",
            "scores": [{"username": "alice", "score": 10}]
        }));
        settle().await;

        tokio::time::sleep(Duration::from_secs(40)).await;
        assert_eq!(remote.count("next_question"), 0);
        let snapshot = channel.snapshot();
        assert_eq!(snapshot.session.view(), SessionView::Results);
        assert_eq!(snapshot.round, RoundPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abnormal_close_ends_session_once() {
        let (mut channel, connector) = channel();
        let mut events = channel.subscribe();
        let remote = open(&mut channel, &connector).await;

        remote.push(question(0));
        settle().await;
        remote.fail();
        settle().await;
        assert_eq!(channel.state(), ConnectionState::Open);

        remote.close(CloseCode::ABNORMAL);
        settle().await;

        assert_eq!(channel.state(), ConnectionState::Closed);
        let events = events.drain();
        assert_eq!(count_ended(&events), 1);
        assert!(events.contains(&SessionEvent::Closed {
            code: CloseCode::ABNORMAL
        }));

        let snapshot = channel.snapshot();
        assert!(snapshot.session.identity().is_none());
        assert_eq!(snapshot.session.view(), SessionView::Ended);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(remote.count("next_question"), 0);
        assert_eq!(remote.count("ping"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_normal_remote_close_keeps_session() {
        let (mut channel, connector) = channel();
        let mut events = channel.subscribe();
        let remote = open(&mut channel, &connector).await;

        remote.close(CloseCode::NORMAL);
        settle().await;

        assert_eq!(channel.state(), ConnectionState::Closed);
        assert_eq!(count_ended(&events.drain()), 0);
        assert!(channel.snapshot().session.identity().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_ended_frame_closes_once() {
        let (mut channel, connector) = channel();
        let mut events = channel.subscribe();
        let remote = open(&mut channel, &connector).await;

        remote.push(json!({"type": "session_ended", "message": "host left"}));
        settle().await;
        remote.close(CloseCode(4000));
        settle().await;

        assert_eq!(channel.state(), ConnectionState::Closed);
        assert_eq!(remote.closes(), vec![CloseCode::NORMAL]);
        let events = events.drain();
        assert_eq!(count_ended(&events), 1);
        assert!(events.contains(&SessionEvent::SessionEnded {
            reason: Some("host left".to_string())
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_after_close() {
        let (mut channel, connector) = channel();
        let first = open(&mut channel, &connector).await;
        first.close(CloseCode::ABNORMAL);
        settle().await;

        channel.connect("ABC123", "alice", true).await.unwrap();
        settle().await;
        assert_eq!(connector.opens(), 2);
        assert_eq!(channel.state(), ConnectionState::Open);
        assert!(channel.snapshot().session.identity().unwrap().is_host);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_open_leaves_channel_closed() {
        let (mut channel, connector) = channel();
        connector.refuse_next();

        let err = channel.connect("ABC123", "alice", false).await.unwrap_err();
        assert!(matches!(err, SessionError::Transport(_)));
        assert_eq!(channel.state(), ConnectionState::Closed);

        channel.connect("ABC123", "alice", false).await.unwrap();
        assert_eq!(channel.state(), ConnectionState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_connect_does_not_wedge_channel() {
        let (mut channel, connector) = channel();
        connector.stall_next();

        let attempt = tokio::time::timeout(
            Duration::from_secs(5),
            channel.connect("ABC123", "alice", false),
        )
        .await;
        assert!(attempt.is_err());
        assert_eq!(channel.state(), ConnectionState::Closed);

        channel.disconnect().await;
        assert_eq!(channel.state(), ConnectionState::Closed);

        channel.connect("ABC123", "alice", false).await.unwrap();
        assert_eq!(channel.state(), ConnectionState::Open);
        assert_eq!(connector.opens(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_answer_after_game_end_is_dropped() {
        let (mut channel, connector) = channel();
        let remote = open(&mut channel, &connector).await;

        remote.push(question(0));
        remote.push(json!({
            "type": "game_ended",
            "scores": [{"username": "alice", "score": 10}]
        }));
        settle().await;

        channel.submit_answer("Red");
        settle().await;
        assert_eq!(remote.count("answer_submission"), 0);
        assert!(!channel.snapshot().session.answer().submitted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_answer_after_expiry_is_dropped() {
        let (mut channel, connector) = channel();
        let remote = open(&mut channel, &connector).await;

        remote.push(question(0));
        settle().await;
        tokio::time::sleep(Duration::from_secs(31)).await;

        channel.submit_answer("Red");
        settle().await;
        assert_eq!(remote.count("answer_submission"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_item_notification_expires() {
        let (mut channel, connector) = channel();
        let mut events = channel.subscribe();
        let remote = open(&mut channel, &connector).await;

        remote.push(json!({
            "type": "item_used",
            "item_type": "CANNON",
            "player_id": 1,
            "target_id": 2,
            "source_username": "alice",
            "target_username": "bob"
        }));
        settle().await;

        let notifications = channel.snapshot().notifications;
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].message, "You used CANNON on bob");
        assert!(events
            .drain()
            .iter()
            .any(|e| matches!(e, SessionEvent::Notification(_))));

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(channel.snapshot().notifications.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_bad_frames_do_not_stop_the_session() {
        let (mut channel, connector) = channel();
        let remote = open(&mut channel, &connector).await;

        remote.push_text("not json");
        remote.push(json!({"type": "mystery"}));
        remote.push(json!({"no_type": true}));
        remote.push(json!({
            "type": "update_scores",
            "scores": [{"username": "A", "score": 100}, {"username": "B", "score": 50}]
        }));
        settle().await;

        assert_eq!(channel.state(), ConnectionState::Open);
        let snapshot = channel.snapshot();
        let scores = snapshot.session.scores();
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0].player_name, "A");
        assert_eq!(scores[1].score, 50);
    }
}
