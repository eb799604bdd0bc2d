//! Terminal table UI for a blackjack room.
//!
//! The UI delivers discrete intents (deal, hit, stand, new round,
//! quit) into the turn engine and renders whatever the round view
//! reports back. It holds no game rules of its own: scores, turn
//! order, and outcomes all come from the library, and every state
//! change is mirrored to the room through the gateway.

use anyhow::Result;
use blackjack::{
    MemoryStore, Outcome, PlayerId, PlayerView, Round, RoundPhase, RoomGateway, TurnEngine,
};
use chrono::{DateTime, Utc};
use ratatui::{
    DefaultTerminal, Frame,
    crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    layout::{Alignment, Constraint, Layout},
    style::{Style, Stylize},
    text::{Line, Span},
    widgets::{Block, List, ListItem, Paragraph},
};
use std::{collections::VecDeque, sync::Arc, time::Duration};
use tokio::sync::mpsc;

const POLL_TIMEOUT: Duration = Duration::from_millis(100);
const MAX_LOG_RECORDS: usize = 256;
const WATCH_BUFFER: usize = 32;

/// How the client participates in a room.
pub enum Mode {
    /// Open a new room and run every seat from this terminal.
    Host { seats: Vec<PlayerId> },
    /// Take one seat in somebody else's waiting room.
    Join { room_id: String, player: PlayerId },
    /// Follow a room read-only.
    Observe { room_id: String },
}

#[derive(Clone, Copy)]
enum RecordKind {
    Info,
    Game,
    Error,
    Sync,
}

/// A timestamped log line shown under the table.
struct Record {
    datetime: DateTime<Utc>,
    kind: RecordKind,
    content: String,
}

impl Record {
    fn new(kind: RecordKind, content: String) -> Self {
        Self {
            datetime: Utc::now(),
            kind,
            content,
        }
    }
}

/// Whether the last room write made it to the backend.
#[derive(Clone, Copy, PartialEq)]
enum SyncStatus {
    Synced,
    Degraded,
}

/// Snapshot stream from the room watcher task.
enum WatchEvent {
    Updated(Round),
    Unreadable(String),
    Closed(String),
}

pub struct TuiApp {
    engine: TurnEngine,
    gateway: RoomGateway<MemoryStore>,
    store: Arc<MemoryStore>,
    mode: Mode,
    round: Option<Round>,
    records: VecDeque<Record>,
    status: SyncStatus,
    watch_rx: Option<mpsc::Receiver<WatchEvent>>,
}

impl TuiApp {
    #[must_use]
    pub fn new(mode: Mode) -> Self {
        let store = Arc::new(MemoryStore::new());
        let gateway = RoomGateway::new(Arc::clone(&store));
        Self {
            engine: TurnEngine::new(),
            gateway,
            store,
            mode,
            round: None,
            records: VecDeque::new(),
            status: SyncStatus::Synced,
            watch_rx: None,
        }
    }

    pub async fn run(mut self, mut terminal: DefaultTerminal) -> Result<()> {
        self.record(
            RecordKind::Info,
            "welcome to the table. press Q to leave".to_string(),
        );
        if matches!(self.mode, Mode::Host { .. }) {
            self.open_round().await;
        } else {
            self.attach().await;
        }

        loop {
            self.drain_watch();
            terminal.draw(|frame| self.draw(frame))?;

            if !event::poll(POLL_TIMEOUT)? {
                continue;
            }
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if self.handle_key(key).await {
                    break;
                }
            }
        }

        // Only the host closes the room on the way out. A failed
        // cleanup is logged, never surfaced.
        if matches!(self.mode, Mode::Host { .. }) {
            if let Some(round) = self.round.take() {
                if let Err(e) = self.gateway.finalize_room(&round).await {
                    log::warn!("cleanup of room {} failed: {e}", round.room_id());
                }
            }
        }
        Ok(())
    }

    async fn handle_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => return true,
            KeyCode::Char('d') | KeyCode::Char('D') => self.deal().await,
            KeyCode::Char('h') | KeyCode::Char('H') => self.hit().await,
            KeyCode::Char('s') | KeyCode::Char('S') => self.stand().await,
            KeyCode::Char('n') | KeyCode::Char('N') => self.next_round().await,
            _ => {}
        }
        false
    }

    /// Open a fresh round and create its remote room. On room-creation
    /// failure the table stays closed and the player is told to retry;
    /// playing an unshared round would be lying to the other seats.
    async fn open_round(&mut self) {
        let Mode::Host { seats } = &self.mode else {
            return;
        };
        let round = match self.engine.start_round(seats) {
            Ok(round) => round,
            Err(e) => {
                self.record(RecordKind::Error, e.to_string());
                return;
            }
        };
        let created = self.gateway.create_room(&round).await;
        match created {
            Ok(room_id) => {
                self.record(
                    RecordKind::Info,
                    format!("room {room_id} is open; press D to deal"),
                );
                self.spawn_watcher(room_id);
                self.round = Some(round);
            }
            Err(e) => {
                self.record(
                    RecordKind::Error,
                    format!("{e}; press N to retry opening a room"),
                );
                self.round = None;
            }
        }
    }

    /// Join or observe an existing room and start following it.
    async fn attach(&mut self) {
        let (room_id, join_as) = match &self.mode {
            Mode::Join { room_id, player } => (room_id.clone(), Some(player.clone())),
            Mode::Observe { room_id } => (room_id.clone(), None),
            Mode::Host { .. } => return,
        };
        let attached = match &join_as {
            Some(player) => self.gateway.join_room(&room_id, player).await,
            None => self.gateway.pull_state(&room_id).await,
        };
        match attached {
            Ok(round) => {
                let verb = if join_as.is_some() { "joined" } else { "watching" };
                self.record(RecordKind::Info, format!("{verb} room {room_id}"));
                self.spawn_watcher(room_id);
                self.round = Some(round);
            }
            Err(e) => self.record(RecordKind::Error, e.to_string()),
        }
    }

    /// Subscribe to the room's document stream, the same way any other
    /// client of the room would follow it.
    fn spawn_watcher(&mut self, room_id: String) {
        let (tx, rx) = mpsc::channel(WATCH_BUFFER);
        self.watch_rx = Some(rx);
        let gateway = RoomGateway::new(Arc::clone(&self.store));
        tokio::spawn(async move {
            let mut watch = match gateway.watch_room(&room_id).await {
                Ok(watch) => watch,
                Err(e) => {
                    let _ = tx.send(WatchEvent::Unreadable(e.to_string())).await;
                    return;
                }
            };
            while let Some(result) = watch.next_round().await {
                let event = match result {
                    Ok(round) => WatchEvent::Updated(round),
                    Err(e) => WatchEvent::Unreadable(e.to_string()),
                };
                if tx.send(event).await.is_err() {
                    return;
                }
            }
            let _ = tx.send(WatchEvent::Closed(room_id)).await;
        });
    }

    fn drain_watch(&mut self) {
        let mut events = Vec::new();
        if let Some(rx) = self.watch_rx.as_mut() {
            while let Ok(event) = rx.try_recv() {
                events.push(event);
            }
        }
        let host = matches!(self.mode, Mode::Host { .. });
        for event in events {
            match event {
                WatchEvent::Updated(round) => {
                    let note = format!("room {}: {}", round.room_id(), round.phase());
                    // The host's own round stays authoritative; joiners
                    // and observers adopt each remote snapshot.
                    if !host {
                        self.round = Some(round);
                    }
                    self.record(RecordKind::Sync, note);
                }
                WatchEvent::Unreadable(reason) => self.record(RecordKind::Sync, reason),
                WatchEvent::Closed(room_id) => {
                    self.record(RecordKind::Sync, format!("room {room_id} closed"));
                    if !host {
                        self.round = None;
                    }
                }
            }
        }
    }

    async fn deal(&mut self) {
        if self.refuse_if_observer() {
            return;
        }
        let Some(round) = self.round.as_mut() else {
            self.record(RecordKind::Error, "no open room".to_string());
            return;
        };
        match self.engine.deal(round) {
            Ok(()) => {
                self.record(RecordKind::Game, "cards are out".to_string());
                self.push().await;
            }
            Err(e) => self.record(RecordKind::Error, e.to_string()),
        }
    }

    async fn hit(&mut self) {
        let Some(id) = self.actionable_player() else {
            return;
        };
        let Some(round) = self.round.as_mut() else {
            return;
        };
        match self.engine.hit(round, &id) {
            Ok(()) => {
                self.describe_player(&id);
                self.announce_if_finished();
                self.push().await;
            }
            Err(e) => self.record(RecordKind::Error, e.to_string()),
        }
    }

    async fn stand(&mut self) {
        let Some(id) = self.actionable_player() else {
            return;
        };
        let Some(round) = self.round.as_mut() else {
            return;
        };
        match self.engine.stand(round, &id) {
            Ok(()) => {
                self.record(RecordKind::Game, format!("{id} stands"));
                self.announce_if_finished();
                self.push().await;
            }
            Err(e) => self.record(RecordKind::Error, e.to_string()),
        }
    }

    async fn next_round(&mut self) {
        if !matches!(self.mode, Mode::Host { .. }) {
            self.record(
                RecordKind::Info,
                "only the host opens new rounds".to_string(),
            );
            return;
        }
        if let Some(old) = self.round.take() {
            if let Err(e) = self.gateway.finalize_room(&old).await {
                self.record(RecordKind::Error, e.to_string());
            }
        }
        self.open_round().await;
    }

    /// The seat allowed to act right now, filtered by mode: the host
    /// runs every seat, a joiner only their own.
    fn actionable_player(&mut self) -> Option<PlayerId> {
        if self.refuse_if_observer() {
            return None;
        }
        let Some(active) = self.active_player_id() else {
            self.record(RecordKind::Error, "nobody's turn right now".to_string());
            return None;
        };
        let own_seat = match &self.mode {
            Mode::Join { player, .. } => Some(player.clone()),
            _ => None,
        };
        if own_seat.is_some_and(|mine| mine != active) {
            self.record(RecordKind::Info, format!("waiting on {active}"));
            return None;
        }
        Some(active)
    }

    fn refuse_if_observer(&mut self) -> bool {
        if matches!(self.mode, Mode::Observe { .. }) {
            self.record(RecordKind::Info, "observing only".to_string());
            return true;
        }
        false
    }

    fn active_player_id(&self) -> Option<PlayerId> {
        let round = self.round.as_ref()?;
        if round.phase() != RoundPhase::InProgress {
            return None;
        }
        let index = round.active_player_index()?;
        Some(round.players()[index].id().clone())
    }

    fn describe_player(&mut self, id: &PlayerId) {
        let Some(round) = &self.round else { return };
        let Some(player) = round.player(id) else {
            return;
        };
        let note = if player.busted() {
            format!("{id} draws and busts at {}", player.hand().total())
        } else if player.stood() {
            format!("{id} lands on {}", player.hand().total())
        } else {
            format!("{id} draws ({})", player.hand().total())
        };
        self.record(RecordKind::Game, note);
    }

    fn announce_if_finished(&mut self) {
        let Some(round) = &self.round else { return };
        if round.phase() != RoundPhase::Finished {
            return;
        }
        let mut notes = vec![format!(
            "dealer finishes on {}",
            round.dealer_hand().total()
        )];
        for player in round.players() {
            if let Some(outcome) = round.outcomes().get(player.id()) {
                let verdict = match outcome {
                    Outcome::Win => "wins",
                    Outcome::Lose => "loses",
                    Outcome::Push => "pushes",
                };
                notes.push(format!("{} {verdict}", player.id()));
            }
        }
        notes.push("press N for a new round".to_string());
        for note in notes {
            self.record(RecordKind::Game, note);
        }
    }

    /// Mirror the round to the room. Push failures degrade the status
    /// indicator but never roll back the local round.
    async fn push(&mut self) {
        let Some(round) = &self.round else { return };
        let result = self.gateway.push_state(round).await;
        match result {
            Ok(()) => self.status = SyncStatus::Synced,
            Err(e) => {
                self.status = SyncStatus::Degraded;
                self.record(RecordKind::Sync, format!("out of sync: {e}"));
            }
        }
    }

    fn record(&mut self, kind: RecordKind, content: String) {
        self.records.push_front(Record::new(kind, content));
        self.records.truncate(MAX_LOG_RECORDS);
    }

    fn draw(&self, frame: &mut Frame) {
        let seats = self.round.as_ref().map_or(1, |r| r.players().len());
        let [title_area, dealer_area, players_area, log_area, footer_area] = Layout::vertical([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(2 + seats as u16),
            Constraint::Min(5),
            Constraint::Length(3),
        ])
        .areas(frame.area());

        let room = self
            .round
            .as_ref()
            .map_or_else(|| "none".to_string(), |r| r.room_id().to_string());
        let title = Paragraph::new(format!("blackjack  |  room {room}"))
            .alignment(Alignment::Center)
            .block(Block::bordered());
        frame.render_widget(title, title_area);

        let view = self.round.as_ref().map(Round::view);

        let dealer_line = view.as_ref().map_or_else(
            || Line::from("no round in play"),
            |view| {
                let mut spans: Vec<Span> = Vec::new();
                for card in &view.dealer.cards {
                    spans.push(Span::styled(format!("[{card}] "), Style::default().white()));
                }
                if view.dealer.hole_hidden {
                    spans.push(Span::styled("[??]", Style::default().dark_gray()));
                }
                if let Some(total) = view.dealer.total {
                    spans.push(format!(" = {total}").into());
                }
                Line::from(spans)
            },
        );
        frame.render_widget(
            Paragraph::new(dealer_line).block(Block::bordered().title("dealer")),
            dealer_area,
        );

        let player_lines: Vec<Line> = view.as_ref().map_or_else(Vec::new, |view| {
            view.players.iter().map(make_player_line).collect()
        });
        frame.render_widget(
            Paragraph::new(player_lines).block(Block::bordered().title("players")),
            players_area,
        );

        let items: Vec<ListItem> = self
            .records
            .iter()
            .map(|record| {
                let style = match record.kind {
                    RecordKind::Info => Style::default(),
                    RecordKind::Game => Style::default().light_green(),
                    RecordKind::Error => Style::default().light_red(),
                    RecordKind::Sync => Style::default().light_blue(),
                };
                ListItem::new(Line::from(vec![
                    Span::raw(record.datetime.format("%H:%M:%S ").to_string()),
                    Span::styled(record.content.clone(), style),
                ]))
            })
            .collect();
        frame.render_widget(
            List::new(items).block(Block::bordered().title("table log")),
            log_area,
        );

        let status = match self.status {
            SyncStatus::Synced => Span::styled("synced", Style::default().light_green()),
            SyncStatus::Degraded => Span::styled("out of sync", Style::default().light_red()),
        };
        let keys = match self.mode {
            Mode::Observe { .. } => "Q quit   ",
            _ => "D deal  H hit  S stand  N new round  Q quit   ",
        };
        let footer = Paragraph::new(Line::from(vec![keys.into(), "room: ".into(), status]))
            .block(Block::bordered());
        frame.render_widget(footer, footer_area);
    }
}

fn make_player_line(player: &PlayerView) -> Line<'static> {
    let marker = if player.active { "> " } else { "  " };
    let mut spans: Vec<Span> = vec![Span::raw(format!("{marker}{}: ", player.id))];
    for card in &player.cards {
        spans.push(Span::raw(format!("[{card}] ")));
    }
    spans.push(Span::raw(format!("= {}", player.total)));
    if player.busted {
        spans.push(Span::styled("  BUST", Style::default().light_red()));
    } else if player.stood {
        spans.push(Span::raw("  stood"));
    }
    if let Some(outcome) = player.outcome {
        let span = match outcome {
            Outcome::Win => Span::styled("  WIN", Style::default().light_green().bold()),
            Outcome::Lose => Span::styled("  LOSE", Style::default().light_red()),
            Outcome::Push => Span::styled("  PUSH", Style::default().light_yellow()),
        };
        spans.push(span);
    }
    let mut line = Line::from(spans);
    if player.active {
        line = line.bold();
    }
    line
}
