use std::collections::VecDeque;
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use camino::Utf8PathBuf;
use crossterm::ExecutableCommand;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use miette::IntoDiagnostic;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row as TableRow, Table, TableState, Wrap};

use crate::app::{AggregateResult, App, ProgressEvent, ProgressSink};
use crate::auth::{LoginForm, LoginOutcome};
use crate::catalog::CatalogClient;
use crate::config::ResolvedConfig;
use crate::domain::{RowField, SortDirection};
use crate::error::DashError;
use crate::export::{self, ExportOptions};
use crate::store::{LoadState, ViewStore};

const LOGS_MAX: usize = 200;
const EXPANDED_SUBJECT_WIDTH: usize = 40;
const EXPANDED_SUBJECT_LINES: usize = 8;
const FOOTER: &str = "bookdash · Open Library books & authors · data courtesy of openlibrary.org";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Login,
    Dashboard,
    Logs,
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Resolve,
    Fetch,
    Merge,
}

impl Phase {
    fn label(self) -> &'static str {
        match self {
            Phase::Idle => "Idle",
            Phase::Resolve => "Resolve",
            Phase::Fetch => "Fetch",
            Phase::Merge => "Merge",
        }
    }
}

#[derive(Debug)]
struct Activity {
    phase: Phase,
    status: String,
    latency_ms: Option<u128>,
    partial_failures: usize,
    logs: VecDeque<String>,
    started: Instant,
    in_flight: usize,
}

impl Activity {
    fn new(status: &str) -> Self {
        Self {
            phase: Phase::Idle,
            status: status.to_string(),
            latency_ms: None,
            partial_failures: 0,
            logs: VecDeque::new(),
            started: Instant::now(),
            in_flight: 0,
        }
    }

    fn run_started(&mut self) {
        self.in_flight += 1;
        self.phase = Phase::Resolve;
        self.status = "starting".to_string();
        self.latency_ms = None;
        self.partial_failures = 0;
        self.started = Instant::now();
    }

    // Overlapping runs keep the header busy until the last one lands.
    fn run_finished(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
        if self.in_flight == 0 {
            self.phase = Phase::Idle;
        }
    }

    fn record(&mut self, event: &ProgressEvent) {
        let message = event.message.trim().to_string();
        if let Some((phase, payload)) = parse_phase(&message) {
            self.phase = phase;
            self.status = payload.to_string();
        } else if let Some(latency) = parse_latency(&message) {
            self.latency_ms = Some(latency);
        }
        if event.failure.is_some() {
            self.partial_failures = self.partial_failures.saturating_add(1);
        }
        push_log(&mut self.logs, format!("[{}] {message}", timestamp()));
    }
}

struct TuiProgress {
    activity: Arc<Mutex<Activity>>,
}

impl ProgressSink for TuiProgress {
    fn event(&self, event: ProgressEvent) {
        if let Ok(mut activity) = self.activity.lock() {
            activity.record(&event);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginField {
    UserId,
    Password,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginAction {
    None,
    Accepted,
    Quit,
}

#[derive(Debug, Clone)]
pub struct LoginUi {
    pub form: LoginForm,
    pub focus: LoginField,
}

impl Default for LoginUi {
    fn default() -> Self {
        Self {
            form: LoginForm::default(),
            focus: LoginField::UserId,
        }
    }
}

impl LoginUi {
    pub fn handle_key(&mut self, key: KeyEvent) -> LoginAction {
        if key.kind != KeyEventKind::Press {
            return LoginAction::None;
        }
        match key.code {
            KeyCode::Esc => return LoginAction::Quit,
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
                self.focus = match self.focus {
                    LoginField::UserId => LoginField::Password,
                    LoginField::Password => LoginField::UserId,
                };
            }
            KeyCode::F(2) => self.form.toggle_password_visibility(),
            KeyCode::Enter => {
                if self.form.submit() == LoginOutcome::Accepted {
                    return LoginAction::Accepted;
                }
            }
            KeyCode::Backspace => {
                self.focused_mut().pop();
            }
            KeyCode::Char(ch) => self.focused_mut().push(ch),
            _ => {}
        }
        LoginAction::None
    }

    fn focused_mut(&mut self) -> &mut String {
        match self.focus {
            LoginField::UserId => &mut self.form.user_id,
            LoginField::Password => &mut self.form.password,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardMode {
    Browse,
    Search,
    Edit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardAction {
    None,
    Quit,
    Export,
    Refetch,
    ShowLogs,
    ShowHelp,
}

pub struct DashboardUi {
    pub store: ViewStore,
    pub mode: DashboardMode,
    pub cursor: usize,
    pub search_input: String,
    pub edit_input: String,
    pub status: String,
    export_directory: Utf8PathBuf,
    export_options: ExportOptions,
    refetch_on_page_change: bool,
}

impl DashboardUi {
    pub fn new(config: &ResolvedConfig) -> Self {
        Self {
            store: ViewStore::new(config.rows_per_page, config.collation),
            mode: DashboardMode::Browse,
            cursor: 0,
            search_input: String::new(),
            edit_input: String::new(),
            status: "ready".to_string(),
            export_directory: config.export_directory.clone(),
            export_options: config.export.clone(),
            refetch_on_page_change: config.refetch_on_page_change,
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> DashboardAction {
        if key.kind != KeyEventKind::Press {
            return DashboardAction::None;
        }
        let action = match self.mode {
            DashboardMode::Browse => self.handle_browse_key(key),
            DashboardMode::Search => self.handle_search_key(key),
            DashboardMode::Edit => self.handle_edit_key(key),
        };
        self.clamp_cursor();
        action
    }

    pub fn selected_row(&self) -> Option<usize> {
        self.store
            .page_rows()
            .get(self.cursor)
            .map(|(index, _)| *index)
    }

    pub fn apply_result(&mut self, result: AggregateResult) {
        self.status = format!(
            "loaded {} rows for {} ({} partial failures)",
            result.rows.len(),
            result.subject,
            result.failures.len()
        );
        self.store.replace_rows(result.rows);
        if self.mode == DashboardMode::Edit && self.store.edit_session().is_none() {
            self.mode = DashboardMode::Browse;
        }
        self.clamp_cursor();
    }

    pub fn apply_failure(&mut self, err: &DashError) {
        self.status = "no data".to_string();
        self.store.mark_failed(err.to_string());
        self.mode = DashboardMode::Browse;
        self.cursor = 0;
    }

    pub fn export(&mut self) -> Result<Utf8PathBuf, DashError> {
        let path = export::write_csv(
            self.store.rows(),
            &self.export_directory,
            &self.export_options,
        )?;
        self.status = format!("exported {} rows to {path}", self.store.rows().len());
        Ok(path)
    }

    fn handle_browse_key(&mut self, key: KeyEvent) -> DashboardAction {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return DashboardAction::Quit,
            KeyCode::F(4) => return DashboardAction::ShowLogs,
            KeyCode::Char('?') => return DashboardAction::ShowHelp,
            KeyCode::Char('d') => return DashboardAction::Export,
            KeyCode::Up => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Down => self.cursor = self.cursor.saturating_add(1),
            KeyCode::Right | KeyCode::Char('n') => {
                return self.change_page(|store| store.next_page());
            }
            KeyCode::Left | KeyCode::Char('p') => {
                return self.change_page(|store| store.prev_page());
            }
            KeyCode::Char('r') => {
                return self.change_page(|store| {
                    store.cycle_page_size();
                });
            }
            KeyCode::Char('/') => {
                self.search_input = self.store.query().search_text.clone();
                self.mode = DashboardMode::Search;
            }
            KeyCode::Char(ch @ '1'..='7') => {
                let column = ch as usize - '1' as usize;
                self.store.request_sort(RowField::ALL[column]);
            }
            KeyCode::Char('x') => {
                if let Some(index) = self.selected_row() {
                    self.store.toggle_expand(index);
                }
            }
            KeyCode::Char('e') => {
                if let Some(index) = self.selected_row()
                    && self.store.begin_edit(index)
                {
                    self.edit_input = self.focused_value();
                    self.mode = DashboardMode::Edit;
                }
            }
            _ => {}
        }
        DashboardAction::None
    }

    fn handle_search_key(&mut self, key: KeyEvent) -> DashboardAction {
        match key.code {
            KeyCode::Enter | KeyCode::Esc => self.mode = DashboardMode::Browse,
            KeyCode::Backspace => {
                self.search_input.pop();
                self.apply_search();
            }
            KeyCode::Char(ch) => {
                self.search_input.push(ch);
                self.apply_search();
            }
            _ => {}
        }
        DashboardAction::None
    }

    fn handle_edit_key(&mut self, key: KeyEvent) -> DashboardAction {
        match key.code {
            KeyCode::Esc => {
                self.store.cancel_edit();
                self.mode = DashboardMode::Browse;
                self.status = "edit cancelled".to_string();
            }
            KeyCode::Enter => {
                self.flush_edit_input();
                if let Some(index) = self.store.commit_edit() {
                    self.status = format!("saved row {}", index + 1);
                }
                self.mode = DashboardMode::Browse;
            }
            KeyCode::Tab => self.move_edit_focus(RowField::next),
            KeyCode::BackTab => self.move_edit_focus(RowField::prev),
            KeyCode::Backspace => {
                self.edit_input.pop();
            }
            KeyCode::Char(ch) => self.edit_input.push(ch),
            _ => {}
        }
        DashboardAction::None
    }

    fn change_page<F>(&mut self, change: F) -> DashboardAction
    where
        F: FnOnce(&mut ViewStore),
    {
        let before = self.store.pagination();
        change(&mut self.store);
        if self.store.pagination() == before {
            return DashboardAction::None;
        }
        self.cursor = 0;
        if self.refetch_on_page_change {
            DashboardAction::Refetch
        } else {
            DashboardAction::None
        }
    }

    fn apply_search(&mut self) {
        self.store.set_search_text(self.search_input.clone());
        self.cursor = 0;
    }

    fn focused_value(&self) -> String {
        self.store
            .edit_session()
            .map(|session| session.scratch.get(session.focus).to_string())
            .unwrap_or_default()
    }

    fn flush_edit_input(&mut self) {
        if let Some(field) = self.store.edit_session().map(|session| session.focus) {
            self.store.edit_field(field, self.edit_input.clone());
        }
    }

    fn move_edit_focus(&mut self, step: fn(RowField) -> RowField) {
        self.flush_edit_input();
        if let Some(field) = self.store.edit_session().map(|session| step(session.focus)) {
            self.store.focus_field(field);
            self.edit_input = self.focused_value();
        }
    }

    fn clamp_cursor(&mut self) {
        let len = self.store.page_rows().len();
        self.cursor = self.cursor.min(len.saturating_sub(1));
    }
}

type AggregateMessage = Result<AggregateResult, DashError>;

pub struct Tui {
    screen: Screen,
    previous: Screen,
    login: LoginUi,
    dashboard: DashboardUi,
    activity: Arc<Mutex<Activity>>,
    log_scroll: u16,
}

impl Tui {
    pub fn new(config: &ResolvedConfig) -> Self {
        Self {
            screen: Screen::Login,
            previous: Screen::Login,
            login: LoginUi::default(),
            dashboard: DashboardUi::new(config),
            activity: Arc::new(Mutex::new(Activity::new("waiting for login"))),
            log_scroll: 0,
        }
    }

    pub fn run<C>(&mut self, app: Arc<App<C>>) -> miette::Result<()>
    where
        C: CatalogClient + 'static,
    {
        let mut stdout = io::stdout();
        enable_raw_mode().into_diagnostic()?;
        stdout.execute(EnterAlternateScreen).into_diagnostic()?;

        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).into_diagnostic()?;
        terminal.clear().into_diagnostic()?;

        let result = self.event_loop(&mut terminal, &app);

        disable_raw_mode().into_diagnostic()?;
        let mut stdout = io::stdout();
        stdout.execute(LeaveAlternateScreen).into_diagnostic()?;
        result
    }

    fn event_loop<C>(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
        app: &Arc<App<C>>,
    ) -> miette::Result<()>
    where
        C: CatalogClient + 'static,
    {
        let (tx, rx) = mpsc::channel::<AggregateMessage>();
        let mut tick = 0usize;
        loop {
            self.drain_results(&rx);

            if let Ok(activity) = self.activity.lock() {
                terminal
                    .draw(|frame| draw_ui(frame, self, &activity, tick))
                    .into_diagnostic()?;
            }

            if event::poll(Duration::from_millis(120)).into_diagnostic()?
                && let Event::Key(key) = event::read().into_diagnostic()?
                && self.handle_key(key, app, &tx)
            {
                return Ok(());
            }

            tick = tick.wrapping_add(1);
        }
    }

    fn handle_key<C>(
        &mut self,
        key: KeyEvent,
        app: &Arc<App<C>>,
        tx: &Sender<AggregateMessage>,
    ) -> bool
    where
        C: CatalogClient + 'static,
    {
        if key.kind != KeyEventKind::Press {
            return false;
        }
        match self.screen {
            Screen::Login => match self.login.handle_key(key) {
                LoginAction::Quit => return true,
                LoginAction::Accepted => {
                    self.screen = Screen::Dashboard;
                    self.start_aggregation(app, tx);
                }
                LoginAction::None => {}
            },
            Screen::Dashboard => match self.dashboard.handle_key(key) {
                DashboardAction::Quit => return true,
                DashboardAction::Export => self.export(),
                DashboardAction::Refetch => self.start_aggregation(app, tx),
                DashboardAction::ShowLogs => self.show(Screen::Logs),
                DashboardAction::ShowHelp => self.show(Screen::Help),
                DashboardAction::None => {}
            },
            Screen::Logs | Screen::Help => match key.code {
                KeyCode::PageUp | KeyCode::Up => self.scroll_logs(5),
                KeyCode::PageDown | KeyCode::Down => self.scroll_logs(-5),
                KeyCode::Esc | KeyCode::Char('q') | KeyCode::F(4) | KeyCode::Char('?') => {
                    self.screen = self.previous;
                }
                _ => {}
            },
        }
        false
    }

    fn show(&mut self, screen: Screen) {
        self.previous = self.screen;
        self.screen = screen;
        self.log_scroll = 0;
    }

    // Starts one aggregation run on a background thread. Runs are not
    // cancelled; whichever finishes last provides the rows.
    fn start_aggregation<C>(&mut self, app: &Arc<App<C>>, tx: &Sender<AggregateMessage>)
    where
        C: CatalogClient + 'static,
    {
        if let Ok(mut activity) = self.activity.lock() {
            activity.run_started();
        }
        self.dashboard.store.mark_loading();
        self.dashboard.status = "loading".to_string();

        let app = Arc::clone(app);
        let tx = tx.clone();
        let sink = TuiProgress {
            activity: self.activity.clone(),
        };
        thread::spawn(move || {
            // The receiver is gone only when the UI has already exited.
            let _ = tx.send(app.aggregate(&sink));
        });
    }

    fn drain_results(&mut self, rx: &Receiver<AggregateMessage>) {
        while let Ok(message) = rx.try_recv() {
            match message {
                Ok(result) => self.dashboard.apply_result(result),
                Err(err) => self.dashboard.apply_failure(&err),
            }
            if let Ok(mut activity) = self.activity.lock() {
                activity.run_finished();
            }
        }
    }

    fn export(&mut self) {
        if let Err(err) = self.dashboard.export() {
            tracing::error!(error = %err, "export failed");
            self.dashboard.status = format!("export failed: {err}");
        }
        let status = self.dashboard.status.clone();
        if let Ok(mut activity) = self.activity.lock() {
            push_log(&mut activity.logs, format!("[{}] {status}", timestamp()));
        }
    }

    fn scroll_logs(&mut self, delta: i16) {
        let max = self
            .activity
            .lock()
            .map(|activity| activity.logs.len())
            .unwrap_or(0);
        let max_scroll = max.saturating_sub(1).min(i16::MAX as usize) as i16;
        let next = (self.log_scroll as i16 + delta).clamp(0, max_scroll);
        self.log_scroll = next as u16;
    }
}

fn draw_ui(frame: &mut ratatui::Frame, tui: &Tui, activity: &Activity, tick: usize) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(6),
            Constraint::Length(1),
        ])
        .split(frame.area());

    frame.render_widget(draw_header(tui.screen, activity, tick), chunks[0]);
    match tui.screen {
        Screen::Login => draw_login(frame, &tui.login, chunks[1]),
        Screen::Dashboard => draw_dashboard(frame, &tui.dashboard, activity, chunks[1]),
        Screen::Logs => frame.render_widget(draw_logs_view(activity, tui.log_scroll), chunks[1]),
        Screen::Help => frame.render_widget(draw_help(), chunks[1]),
    }
    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(
            FOOTER,
            Style::default().fg(Color::DarkGray),
        )))
        .alignment(Alignment::Center),
        chunks[2],
    );
}

fn draw_header(screen: Screen, activity: &Activity, tick: usize) -> Paragraph<'static> {
    let busy = !matches!(activity.phase, Phase::Idle);
    let hb = if busy && tick % 2 == 0 { "*" } else { " " };
    let screen_label = match screen {
        Screen::Login => "Login",
        Screen::Dashboard => "Dashboard",
        Screen::Logs => "Logs",
        Screen::Help => "Help",
    };
    let latency = activity
        .latency_ms
        .map(|value| format!("{value} ms"))
        .unwrap_or_else(|| "--".to_string());
    let elapsed = if busy {
        format!("{:.1}s", activity.started.elapsed().as_secs_f64())
    } else {
        "--".to_string()
    };
    Paragraph::new(Line::from(vec![
        Span::styled(
            "BOOKDASH",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled(env!("CARGO_PKG_VERSION"), Style::default().fg(Color::Gray)),
        Span::raw("   View: "),
        Span::styled(screen_label, Style::default().fg(Color::Cyan)),
        Span::raw("   Phase: "),
        Span::styled(activity.phase.label(), Style::default().fg(Color::Yellow)),
        Span::raw(format!(
            "   Latency: {latency}   Elapsed: {elapsed}   Partial failures: {}   ",
            activity.partial_failures
        )),
        Span::styled(hb, Style::default().fg(Color::Green)),
    ]))
    .alignment(Alignment::Left)
    .block(Block::default().borders(Borders::BOTTOM))
}

fn draw_login(frame: &mut ratatui::Frame, login: &LoginUi, area: Rect) {
    let focused = |field: LoginField| {
        if login.focus == field {
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        }
    };
    let visibility = if login.form.show_password {
        "Hide"
    } else {
        "Show"
    };
    let mut lines = vec![
        Line::from(Span::styled(
            "Sign in",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("UserID:   ", focused(LoginField::UserId)),
            Span::raw(login.form.user_id.clone()),
        ]),
        Line::from(vec![
            Span::styled("Password: ", focused(LoginField::Password)),
            Span::raw(login.form.masked_password()),
        ]),
        Line::from(""),
    ];
    if let Some(error) = &login.form.error {
        lines.push(Line::from(Span::styled(
            error.clone(),
            Style::default().fg(Color::Red),
        )));
    }
    lines.push(Line::from(Span::styled(
        format!("Enter login  Tab switch field  F2 {visibility} password  Esc quit"),
        Style::default().fg(Color::Gray),
    )));

    let view = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title("Login"));
    frame.render_widget(view, centered(area, 60, 11));
}

fn draw_dashboard(frame: &mut ratatui::Frame, ui: &DashboardUi, activity: &Activity, area: Rect) {
    let editing = ui.mode == DashboardMode::Edit;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(4),
            Constraint::Length(if editing { 2 } else { 0 }),
            Constraint::Length(1),
        ])
        .split(area);

    frame.render_widget(draw_search_bar(ui), chunks[0]);
    match ui.store.load_state() {
        LoadState::Ready => draw_table(frame, ui, chunks[1]),
        LoadState::Failed(message) => {
            let text = Paragraph::new(vec![
                Line::from(Span::styled(
                    "No data",
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                )),
                Line::from(message.clone()),
            ])
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title("Books"));
            frame.render_widget(text, chunks[1]);
        }
        LoadState::Loading | LoadState::Idle => {
            let text = Paragraph::new(vec![
                Line::from(format!("Loading... ({})", activity.phase.label())),
                Line::from(activity.status.clone()),
            ])
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title("Books"));
            frame.render_widget(text, chunks[1]);
        }
    }
    if editing {
        frame.render_widget(draw_edit_line(ui), chunks[2]);
    }
    frame.render_widget(draw_status_line(ui), chunks[3]);
}

fn draw_search_bar(ui: &DashboardUi) -> Paragraph<'static> {
    let searching = ui.mode == DashboardMode::Search;
    let text = if searching {
        format!("{}_", ui.search_input)
    } else {
        ui.store.query().search_text.clone()
    };
    let label_style = if searching {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    };
    Paragraph::new(Line::from(vec![
        Span::styled("Search by author: ", label_style),
        Span::raw(text),
    ]))
}

fn draw_table(frame: &mut ratatui::Frame, ui: &DashboardUi, area: Rect) {
    let query = ui.store.query();
    let header = TableRow::new(RowField::ALL.iter().map(|field| {
        let arrow = if *field == query.sort_key {
            match query.sort_direction {
                SortDirection::Ascending => " ▲",
                SortDirection::Descending => " ▼",
            }
        } else {
            ""
        };
        Cell::from(format!("{} {}{arrow}", field.index() + 1, field.label()))
            .style(Style::default().add_modifier(Modifier::BOLD))
    }))
    .height(1);

    let session = ui.store.edit_session();
    let rows: Vec<TableRow> = ui
        .store
        .page_rows()
        .into_iter()
        .map(|(index, row)| {
            let editing = session.filter(|session| session.target_index == index);
            let mut height = 1;
            let cells: Vec<Cell> = RowField::ALL
                .iter()
                .map(|field| {
                    if let Some(session) = editing {
                        if session.focus == *field {
                            return Cell::from(format!("{}_", ui.edit_input))
                                .style(Style::default().fg(Color::Yellow));
                        }
                        return Cell::from(session.scratch.get(*field).to_string())
                            .style(Style::default().fg(Color::Yellow));
                    }
                    if *field == RowField::Subject && ui.store.is_expanded(index) {
                        let lines = wrap_chars(&row.subject, EXPANDED_SUBJECT_WIDTH);
                        height = lines.len().clamp(1, EXPANDED_SUBJECT_LINES) as u16;
                        return Cell::from(Text::from(lines));
                    }
                    if *field == RowField::Subject {
                        return Cell::from(ui.store.subject_display(index).into_owned());
                    }
                    Cell::from(row.get(*field).to_string())
                })
                .collect();
            TableRow::new(cells).height(height)
        })
        .collect();

    let widths = [
        Constraint::Percentage(20),
        Constraint::Percentage(15),
        Constraint::Percentage(8),
        Constraint::Percentage(8),
        Constraint::Percentage(23),
        Constraint::Percentage(12),
        Constraint::Percentage(14),
    ];

    let pagination = ui.store.pagination();
    let title = format!(
        " Books | Page {} of {} | {} per page ",
        pagination.page_index + 1,
        ui.store.page_count().max(1),
        pagination.page_size
    );
    let table = Table::new(rows, widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title(title))
        .row_highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        );

    let mut state = TableState::default();
    if ui.mode == DashboardMode::Browse && ui.selected_row().is_some() {
        state.select(Some(ui.cursor));
    }
    frame.render_stateful_widget(table, area, &mut state);
}

fn draw_edit_line(ui: &DashboardUi) -> Paragraph<'static> {
    let field = ui
        .store
        .edit_session()
        .map(|session| session.focus.label())
        .unwrap_or("");
    Paragraph::new(vec![
        Line::from(vec![
            Span::styled(
                format!("Editing {field}: "),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!("{}_", ui.edit_input)),
        ]),
        Line::from(Span::styled(
            "Tab/Shift-Tab field  Enter save  Esc cancel",
            Style::default().fg(Color::Gray),
        )),
    ])
}

fn expand_hint(ui: &DashboardUi) -> &'static str {
    match ui.selected_row() {
        Some(index) if ui.store.is_expanded(index) => "  x Read Less",
        Some(index) if ui.store.is_subject_truncated(index) => "  x Read More",
        _ => "",
    }
}

fn draw_status_line(ui: &DashboardUi) -> Paragraph<'static> {
    let visible = ui.store.visible_rows().len();
    let total = ui.store.rows().len();
    let more = expand_hint(ui);
    Paragraph::new(Line::from(vec![
        Span::styled(
            format!("{visible} of {total} rows  "),
            Style::default().fg(Color::Gray),
        ),
        Span::raw(ui.status.clone()),
        Span::styled(more, Style::default().fg(Color::Cyan)),
    ]))
}

fn draw_logs_view(activity: &Activity, scroll: u16) -> Paragraph<'static> {
    let total = activity.logs.len();
    let visible = 20usize;
    let start = total.saturating_sub(scroll as usize + visible);
    let mut lines = Vec::with_capacity(visible + 1);
    lines.push(Line::from(Span::styled(
        "LOGS (PgUp/PgDn scroll, Esc back)",
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    )));
    for line in activity.logs.iter().skip(start).take(visible) {
        lines.push(Line::from(line.clone()));
    }
    Paragraph::new(lines)
        .block(Block::default())
        .wrap(Wrap { trim: true })
}

fn draw_help() -> Paragraph<'static> {
    let lines = vec![
        Line::from("Up/Down move   n/p or Right/Left page   r rows per page"),
        Line::from("/ search by author   1-7 sort by column (again to reverse)"),
        Line::from("x read more/less on subject   e edit row   d download books.csv"),
        Line::from("Edit: Tab/Shift-Tab field   Enter save   Esc cancel"),
        Line::from("F4 logs   ? help   q quit"),
    ];
    Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Help"))
        .wrap(Wrap { trim: true })
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn wrap_chars(text: &str, width: usize) -> Vec<Line<'static>> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(width.max(1))
        .map(|chunk| Line::from(chunk.iter().collect::<String>()))
        .collect()
}

fn parse_phase(message: &str) -> Option<(Phase, &str)> {
    if let Some(rest) = message.strip_prefix("phase=Resolve;") {
        return Some((Phase::Resolve, rest.trim()));
    }
    if let Some(rest) = message.strip_prefix("phase=Fetch;") {
        return Some((Phase::Fetch, rest.trim()));
    }
    if let Some(rest) = message.strip_prefix("phase=Merge;") {
        return Some((Phase::Merge, rest.trim()));
    }
    None
}

fn parse_latency(message: &str) -> Option<u128> {
    message
        .split("latency_ms=")
        .nth(1)
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|value| value.parse::<u128>().ok())
}

fn push_log(buffer: &mut VecDeque<String>, item: String) {
    buffer.push_back(item);
    while buffer.len() > LOGS_MAX {
        buffer.pop_front();
    }
}

fn timestamp() -> String {
    let secs = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs();
    let mins = (secs / 60) % 60;
    let hours = (secs / 3600) % 24;
    let seconds = secs % 60;
    format!("{hours:02}:{mins:02}:{seconds:02}")
}

#[cfg(test)]
mod tests {
    use crossterm::event::KeyModifiers;

    use super::*;
    use crate::app::{FetchStage, ProgressEvent};
    use crate::config::{Config, ConfigLoader};
    use crate::domain::{Row, WorkKey};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(login: &mut LoginUi, text: &str) {
        for ch in text.chars() {
            login.handle_key(key(KeyCode::Char(ch)));
        }
    }

    fn rows(ids: impl IntoIterator<Item = usize>) -> Vec<Row> {
        ids.into_iter()
            .map(|i| {
                let key: WorkKey = format!("OL{i}W").parse().unwrap();
                let mut row = Row::placeholder(key, format!("Work {i:03}"));
                let author = if i % 2 == 0 { "Carl Sagan" } else { "Ann Druyan" };
                row.author_name = author.to_string();
                row
            })
            .collect()
    }

    fn dashboard(count: usize) -> DashboardUi {
        let config = ConfigLoader::resolve_config(Config::default()).unwrap();
        let mut ui = DashboardUi::new(&config);
        ui.store.replace_rows(rows(0..count));
        ui
    }

    fn result(rows: Vec<Row>) -> AggregateResult {
        AggregateResult {
            subject: "science".to_string(),
            rows,
            failures: Vec::new(),
            fetched_at: "2026-01-01T00:00:00+00:00".to_string(),
            elapsed: Duration::from_millis(5),
        }
    }

    #[test]
    fn login_requires_both_fields() {
        let mut login = LoginUi::default();
        type_text(&mut login, "admin");
        assert_eq!(login.handle_key(key(KeyCode::Enter)), LoginAction::None);
        assert_eq!(
            login.form.error.as_deref(),
            Some("Please enter both userID and Password")
        );
    }

    #[test]
    fn login_accepts_fixed_credentials() {
        let mut login = LoginUi::default();
        type_text(&mut login, "admin");
        login.handle_key(key(KeyCode::Tab));
        type_text(&mut login, "passwrd");
        assert_eq!(login.handle_key(key(KeyCode::Enter)), LoginAction::None);
        assert_eq!(login.form.error.as_deref(), Some("Invalid UserID or password"));

        login.handle_key(key(KeyCode::Backspace));
        login.handle_key(key(KeyCode::Backspace));
        type_text(&mut login, "ord");
        assert_eq!(login.form.password, "password");
        assert_eq!(login.handle_key(key(KeyCode::Enter)), LoginAction::Accepted);
        assert!(login.form.error.is_none());
    }

    #[test]
    fn q_is_text_on_login_screen() {
        let mut login = LoginUi::default();
        assert_eq!(login.handle_key(key(KeyCode::Char('q'))), LoginAction::None);
        assert_eq!(login.form.user_id, "q");
        assert_eq!(login.handle_key(key(KeyCode::Esc)), LoginAction::Quit);
    }

    #[test]
    fn digit_keys_sort_and_flip() {
        let mut ui = dashboard(3);
        ui.handle_key(key(KeyCode::Char('2')));
        assert_eq!(ui.store.query().sort_key, RowField::AuthorName);
        assert_eq!(ui.store.query().sort_direction, SortDirection::Ascending);
        ui.handle_key(key(KeyCode::Char('2')));
        assert_eq!(ui.store.query().sort_direction, SortDirection::Descending);
    }

    #[test]
    fn paging_resets_cursor() {
        let mut ui = dashboard(25);
        for _ in 0..5 {
            ui.handle_key(key(KeyCode::Down));
        }
        assert_eq!(ui.cursor, 5);
        assert_eq!(ui.handle_key(key(KeyCode::Char('n'))), DashboardAction::None);
        assert_eq!(ui.store.pagination().page_index, 1);
        assert_eq!(ui.cursor, 0);

        ui.handle_key(key(KeyCode::Char('n')));
        ui.handle_key(key(KeyCode::Char('n')));
        assert_eq!(ui.store.pagination().page_index, 2);
        assert_eq!(ui.store.page_rows().len(), 5);
    }

    #[test]
    fn search_mode_filters_live() {
        let mut ui = dashboard(4);
        ui.handle_key(key(KeyCode::Char('/')));
        for ch in "druyan".chars() {
            ui.handle_key(key(KeyCode::Char(ch)));
        }
        assert_eq!(ui.store.visible_rows().len(), 2);
        ui.handle_key(key(KeyCode::Enter));
        assert_eq!(ui.mode, DashboardMode::Browse);
        assert_eq!(ui.handle_key(key(KeyCode::Char('q'))), DashboardAction::Quit);
    }

    #[test]
    fn edit_saves_typed_value_into_focused_field() {
        let mut ui = dashboard(2);
        ui.handle_key(key(KeyCode::Char('e')));
        assert_eq!(ui.mode, DashboardMode::Edit);
        assert_eq!(ui.edit_input, "Work 000");

        ui.handle_key(key(KeyCode::Tab));
        assert_eq!(ui.edit_input, "Carl Sagan");
        ui.edit_input.clear();
        for ch in "C. Sagan".chars() {
            ui.handle_key(key(KeyCode::Char(ch)));
        }
        ui.handle_key(key(KeyCode::Enter));

        assert_eq!(ui.mode, DashboardMode::Browse);
        assert_eq!(ui.store.rows()[0].author_name, "C. Sagan");
        assert_eq!(ui.store.rows()[0].title, "Work 000");
        assert_eq!(ui.store.rows()[1].author_name, "Ann Druyan");
    }

    #[test]
    fn escape_discards_edit() {
        let mut ui = dashboard(1);
        ui.handle_key(key(KeyCode::Char('e')));
        ui.handle_key(key(KeyCode::Char('!')));
        ui.handle_key(key(KeyCode::Esc));
        assert_eq!(ui.store.rows()[0].title, "Work 000");
        assert!(ui.store.edit_session().is_none());
    }

    #[test]
    fn export_writes_all_rows_into_configured_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut ui = dashboard(12);
        ui.export_directory = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        ui.store.set_search_text("sagan");
        assert_eq!(ui.handle_key(key(KeyCode::Char('d'))), DashboardAction::Export);

        let path = ui.export().unwrap();
        assert!(path.as_str().ends_with("books.csv"));
        let content = std::fs::read_to_string(path.as_std_path()).unwrap();
        assert_eq!(content.lines().count(), 12);
    }

    #[test]
    fn page_changes_request_refetch_when_enabled() {
        let mut ui = dashboard(30);
        ui.refetch_on_page_change = true;
        assert_eq!(ui.handle_key(key(KeyCode::Char('n'))), DashboardAction::Refetch);
        assert_eq!(ui.handle_key(key(KeyCode::Char('r'))), DashboardAction::Refetch);
        assert_eq!(ui.store.pagination().page_index, 1);
        assert_eq!(ui.handle_key(key(KeyCode::Char('p'))), DashboardAction::Refetch);
        // Already on the first page: nothing changes, nothing to fetch.
        assert_eq!(ui.handle_key(key(KeyCode::Char('p'))), DashboardAction::None);
    }

    #[test]
    fn later_result_replaces_rows_and_keeps_state_by_key() {
        let mut ui = dashboard(0);
        ui.apply_result(result(rows(0..4)));

        ui.store.toggle_expand(2);
        ui.cursor = 2;
        ui.handle_key(key(KeyCode::Char('e')));
        assert_eq!(ui.mode, DashboardMode::Edit);
        let edited = ui.store.rows()[2].key.clone();

        // The newer run drops OL0W and reorders the rest.
        ui.apply_result(result(rows([3, 2, 1])));
        let titles: Vec<_> = ui.store.rows().iter().map(|row| row.title.as_str()).collect();
        assert_eq!(titles, vec!["Work 003", "Work 002", "Work 001"]);

        let session = ui.store.edit_session().unwrap();
        assert_eq!(session.key, edited);
        assert_eq!(session.target_index, 1);
        assert!(ui.store.is_expanded(1));
        assert!(!ui.store.is_expanded(0));
        assert_eq!(ui.mode, DashboardMode::Edit);

        ui.apply_result(result(rows([5, 6])));
        assert!(ui.store.edit_session().is_none());
        assert_eq!(ui.mode, DashboardMode::Browse);
        assert_eq!(ui.store.rows().len(), 2);
    }

    #[test]
    fn long_subject_toggles_read_more_and_read_less() {
        let mut ui = dashboard(0);
        let mut long = rows(0..1);
        long[0].subject = "Astronomy, ".repeat(20);
        ui.apply_result(result(long));
        assert_eq!(expand_hint(&ui), "  x Read More");
        ui.handle_key(key(KeyCode::Char('x')));
        assert_eq!(expand_hint(&ui), "  x Read Less");
    }

    #[test]
    fn header_stays_busy_until_last_run_finishes() {
        let mut activity = Activity::new("idle");
        activity.run_started();
        activity.run_started();
        activity.run_finished();
        assert_ne!(activity.phase, Phase::Idle);
        activity.run_finished();
        assert_eq!(activity.phase, Phase::Idle);
        activity.run_finished();
        assert_eq!(activity.in_flight, 0);
    }

    #[test]
    fn partial_failures_count_flagged_events() {
        let mut activity = Activity::new("idle");
        activity.record(&ProgressEvent::new("work detail failed for nothing"));
        assert_eq!(activity.partial_failures, 0);
        activity.record(&ProgressEvent::failure(FetchStage::AuthorDetail, "author lookup"));
        assert_eq!(activity.partial_failures, 1);
        assert_eq!(activity.logs.len(), 2);
    }

    #[test]
    fn phase_messages_are_recognized() {
        assert_eq!(
            parse_phase("phase=Fetch; resolving 3 works"),
            Some((Phase::Fetch, "resolving 3 works"))
        );
        assert_eq!(parse_latency("catalog.response latency_ms=42"), Some(42));
        assert_eq!(parse_phase("catalog.request"), None);
    }
}
