use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{Stdout, stdout};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;
use std::{env, process};
use storage_gate_config::{Config, SettingsStore};
use storage_gate_engine::{
    Capability, CapabilityPlatform, CapabilityTable, FlowEvent, FlowUi, FsWorker, Orchestrator,
    PickerOutcome, RecoveryChoice, RecoveryDialog, Trigger, WorkdirLayout,
};

/// Stands in for the OS permission system. Prompts are answered from the keyboard.
struct DesktopPlatform {
    sdk_version: u32,
    table: CapabilityTable,
    granted: HashSet<Capability>,
    prompt: Option<Vec<Capability>>,
    settings_open: bool,
}

impl DesktopPlatform {
    fn new(sdk_version: u32, table: CapabilityTable) -> Self {
        Self {
            sdk_version,
            table,
            granted: HashSet::new(),
            prompt: None,
            settings_open: false,
        }
    }

    /// Flip the broad-access toggle the way the system settings screen would
    fn grant_broad_access(&mut self) {
        if let Some(rule) = self.table.rule_for(self.sdk_version) {
            self.granted.extend(rule.capabilities.iter().copied());
        }
    }
}

impl CapabilityPlatform for DesktopPlatform {
    fn sdk_version(&self) -> u32 {
        self.sdk_version
    }

    fn is_granted(&self, capability: Capability) -> bool {
        self.granted.contains(&capability)
    }

    fn launch_permission_prompt(&mut self, capabilities: &[Capability]) {
        self.prompt = Some(capabilities.to_vec());
    }

    fn open_broad_access_settings(&mut self) {
        self.settings_open = true;
    }

    fn is_legacy_storage(&self) -> bool {
        self.sdk_version < 30
    }
}

#[derive(Default)]
struct TerminalUi {
    dialog: Option<RecoveryDialog>,
    dialog_state: ListState,
    picker: Option<String>,
    warning: Option<PathBuf>,
    ready: Option<(PathBuf, bool)>,
    exit: bool,
}

impl FlowUi for TerminalUi {
    fn present(&mut self, dialog: &RecoveryDialog) {
        self.dialog = Some(dialog.clone());
        self.dialog_state.select(Some(0));
        self.ready = None;
    }

    fn open_folder_picker(&mut self, hint: Option<&Path>) {
        self.picker = Some(
            hint.map(|path| path.display().to_string())
                .unwrap_or_default(),
        );
    }

    fn show_storage_warning(&mut self, workdir: &Path) {
        self.warning = Some(workdir.to_path_buf());
    }

    fn workdir_ready(&mut self, workdir: &Path, changed: bool) {
        self.ready = Some((workdir.to_path_buf(), changed));
    }

    fn exit(&mut self) {
        self.exit = true;
    }
}

type DesktopFlow = Orchestrator<DesktopPlatform, TerminalUi, FsWorker>;

struct App {
    flow: DesktopFlow,
    events: Receiver<FlowEvent>,
    status: Option<String>,
}

impl App {
    fn new(flow: DesktopFlow, events: Receiver<FlowEvent>) -> Self {
        Self {
            flow,
            events,
            status: None,
        }
    }

    fn report(&mut self, result: Result<(), storage_gate_engine::FlowError>) {
        if let Err(e) = result {
            log::warn!("{e}");
            self.status = Some(e.to_string());
        }
    }

    /// Feed finished filesystem jobs back into the flow
    fn drain_worker_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            let result = self.flow.handle(event);
            self.report(result);
        }
    }

    fn trigger(&mut self, trigger: Trigger) {
        self.status = None;
        let result = self.flow.trigger(trigger);
        self.report(result);
    }

    fn answer_prompt(&mut self, requested: Vec<Capability>, granted: bool) {
        if granted {
            self.flow.platform_mut().granted.extend(requested.iter().copied());
        }
        let results: HashMap<Capability, bool> = requested
            .into_iter()
            .map(|capability| (capability, granted))
            .collect();
        let result = self.flow.on_permission_result(&results);
        self.report(result);
    }

    fn leave_settings(&mut self, granted: bool) {
        let platform = self.flow.platform_mut();
        platform.settings_open = false;
        if granted {
            platform.grant_broad_access();
        }
        let result = self.flow.on_resume();
        self.report(result);
    }

    fn choose(&mut self) {
        let ui = self.flow.ui_mut();
        let choice = ui
            .dialog
            .as_ref()
            .zip(ui.dialog_state.selected())
            .and_then(|(dialog, index)| dialog.choices.get(index).copied());
        if let Some(choice) = choice {
            ui.dialog = None;
            let result = self.flow.on_choice(choice);
            self.report(result);
        }
    }

    fn move_selection(&mut self, forward: bool) {
        let ui = self.flow.ui_mut();
        let Some(count) = ui.dialog.as_ref().map(|dialog| dialog.choices.len()) else {
            return;
        };
        let i = match ui.dialog_state.selected() {
            Some(i) if forward => (i + 1) % count,
            Some(0) | None => count - 1,
            Some(i) => i - 1,
        };
        ui.dialog_state.select(Some(i));
    }

    fn finish_picker(&mut self, outcome: PickerOutcome) {
        self.flow.ui_mut().picker = None;
        let result = self.flow.on_folder_picked(outcome);
        self.report(result);
    }

    /// Returns true when the app should quit
    fn on_key(&mut self, code: KeyCode) -> bool {
        if self.flow.ui_mut().warning.take().is_some() {
            return false;
        }

        if let Some(requested) = self.flow.platform_mut().prompt.take() {
            match code {
                KeyCode::Char('y') => self.answer_prompt(requested, true),
                KeyCode::Char('n') => self.answer_prompt(requested, false),
                _ => self.flow.platform_mut().prompt = Some(requested),
            }
            return false;
        }

        if self.flow.platform_mut().settings_open {
            match code {
                KeyCode::Char('y') => self.leave_settings(true),
                KeyCode::Char('n') => self.leave_settings(false),
                _ => {}
            }
            return false;
        }

        // Recovery dialogs are modal and have no cancel action
        if self.flow.ui().dialog.is_some() {
            match code {
                KeyCode::Down | KeyCode::Char('j') => self.move_selection(true),
                KeyCode::Up | KeyCode::Char('k') => self.move_selection(false),
                KeyCode::Enter => self.choose(),
                _ => {}
            }
            return false;
        }

        if let Some(input) = self.flow.ui_mut().picker.as_mut() {
            match code {
                KeyCode::Char(c) => input.push(c),
                KeyCode::Backspace => {
                    input.pop();
                }
                KeyCode::Enter => {
                    let location = input.trim().to_string();
                    self.finish_picker(PickerOutcome::Picked(location));
                }
                KeyCode::Esc => self.finish_picker(PickerOutcome::Cancelled),
                _ => {}
            }
            return false;
        }

        match code {
            KeyCode::Char('q') => true,
            KeyCode::Char('c') => {
                self.trigger(Trigger::ChangeFolder);
                false
            }
            _ => false,
        }
    }
}

struct Args {
    sdk_version: Option<u32>,
    external_root: Option<PathBuf>,
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut parsed = Args {
        sdk_version: None,
        external_root: None,
    };
    let mut rest = args.iter().skip(1);
    while let Some(arg) = rest.next() {
        if arg == "--sdk" {
            let value = rest.next().ok_or("--sdk needs a version")?;
            let version = value
                .parse()
                .map_err(|_| format!("Invalid SDK version '{value}'"))?;
            parsed.sdk_version = Some(version);
        } else if parsed.external_root.is_none() && !arg.starts_with('-') {
            parsed.external_root = Some(PathBuf::from(arg));
        } else {
            return Err(format!("Unexpected argument '{arg}'"));
        }
    }
    Ok(parsed)
}

/// The terminal owns stdout, so logs go to a file
fn init_logging() -> Result<PathBuf> {
    let log_path = env::temp_dir().join("storage-gate-cli.log");
    let file = File::create(&log_path)?;
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(log_path)
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let parsed = match parse_args(&args) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("Usage: {} [--sdk <version>] [external-root]", args[0]);
            process::exit(1);
        }
    };
    let log_path = init_logging()?;

    // Without --sdk there is no permission system to satisfy
    let (sdk_version, table) = match parsed.sdk_version {
        Some(version) => (version, CapabilityTable::android_default()),
        None => (0, CapabilityTable::unrestricted()),
    };
    let external_root = parsed
        .external_root
        .unwrap_or_else(Config::desktop_external_root);

    let config_path = Config::config_path();
    let store = match SettingsStore::open(&config_path) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: Failed to load config file: {e}");
            eprintln!("Fix or remove {}", config_path.display());
            process::exit(1);
        }
    };

    let (tx, rx) = mpsc::channel();
    let worker = FsWorker::spawn(WorkdirLayout::default(), move |event| {
        let _ = tx.send(event);
    })?;
    let flow = Orchestrator::new(
        DesktopPlatform::new(sdk_version, table.clone()),
        TerminalUi::default(),
        worker,
        store,
        table,
        external_root,
    );
    let mut app = App::new(flow, rx);

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    app.trigger(Trigger::Launch);
    let res = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("{err:?}");
    }
    match app.flow.reader().workdir() {
        Some(workdir) => println!("Workdir: {}", workdir.display()),
        None => println!("No workdir configured"),
    }
    println!("Log: {}", log_path.display());

    Ok(())
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    loop {
        app.drain_worker_events();
        terminal.draw(|f| ui(f, app))?;
        if app.flow.ui().exit {
            return Ok(());
        }

        if event::poll(Duration::from_millis(50))?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
            && app.on_key(key.code)
        {
            return Ok(());
        }
    }
}

fn choice_label(choice: RecoveryChoice) -> &'static str {
    match choice {
        RecoveryChoice::Retry => "Check again",
        RecoveryChoice::RetryPermissions => "Ask for permission again",
        RecoveryChoice::PickOther => "Choose another folder",
        RecoveryChoice::CreateHere => "Create the folder here",
        RecoveryChoice::Exit => "Exit",
    }
}

fn dialog_message(dialog: &RecoveryDialog) -> String {
    let path = dialog
        .branch
        .path()
        .map(|path| path.display().to_string())
        .unwrap_or_default();
    match dialog.message_key {
        "permission_request_failed" => {
            "Storage permission was not granted. The app cannot run without it.".to_string()
        }
        "workdir_not_exists" => format!("Folder {path} does not exist."),
        "workdir_cannot_create" => format!("Folder {path} cannot be used or created."),
        other => other.to_string(),
    }
}

/// Rectangle of the given percentage size centered in `area`
fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

fn popup(f: &mut Frame, title: &str, lines: Vec<Line>) {
    let area = centered_rect(60, 30, f.area());
    let text = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(title.to_string()))
        .wrap(Wrap { trim: true });
    f.render_widget(Clear, area);
    f.render_widget(text, area);
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([Constraint::Min(0), Constraint::Length(3)])
        .split(f.area());

    let state = app.flow.state().name();
    let mut body = vec![Line::from(vec![
        Span::raw("State: "),
        Span::styled(state, Style::default().fg(Color::Yellow)),
    ])];
    if let Some((workdir, changed)) = &app.flow.ui().ready {
        body.push(Line::from(format!("Workdir: {}", workdir.display())));
        if *changed {
            body.push(Line::from("Workdir changed"));
        }
    }
    if let Some(status) = &app.status {
        body.push(Line::from(Span::styled(
            status.clone(),
            Style::default().fg(Color::Red),
        )));
    }
    let main = Paragraph::new(body)
        .block(Block::default().borders(Borders::ALL).title("Storage"))
        .wrap(Wrap { trim: true });
    f.render_widget(main, chunks[0]);

    let help = if app.flow.platform_mut().prompt.is_some() || app.flow.platform_mut().settings_open
    {
        "y: Allow | n: Deny"
    } else if app.flow.ui().dialog.is_some() {
        "↑/k: Previous | ↓/j: Next | Enter: Choose"
    } else if app.flow.ui().picker.is_some() {
        "Type a path or file:// URI | Enter: Use folder | Esc: Cancel"
    } else {
        "q: Quit | c: Change folder"
    };
    f.render_widget(Paragraph::new(Line::from(help)).block(Block::default()), chunks[1]);

    if let Some(workdir) = &app.flow.ui().warning {
        popup(
            f,
            "Storage",
            vec![
                Line::from("Access outside the app folder is restricted on this system."),
                Line::from(format!("Files will be kept in {}", workdir.display())),
                Line::from(""),
                Line::from("Press any key"),
            ],
        );
        return;
    }

    if let Some(requested) = &app.flow.platform_mut().prompt {
        let mut lines = vec![Line::from("Allow access to:")];
        lines.extend(
            requested
                .iter()
                .map(|capability| Line::from(format!("  {capability}"))),
        );
        popup(f, "Permission", lines);
        return;
    }

    if app.flow.platform_mut().settings_open {
        popup(
            f,
            "Settings",
            vec![Line::from("Allow access to manage all files?")],
        );
        return;
    }

    let ui_state = app.flow.ui_mut();
    if let Some(dialog) = &ui_state.dialog {
        let area = centered_rect(60, 40, f.area());
        let sections = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(4), Constraint::Min(0)])
            .split(area);
        let title = dialog.title_key.to_uppercase();
        let message = Paragraph::new(dialog_message(dialog))
            .block(Block::default().borders(Borders::ALL).title(title))
            .wrap(Wrap { trim: true });
        let choices: Vec<ListItem> = dialog
            .choices
            .iter()
            .map(|choice| ListItem::new(choice_label(*choice)))
            .collect();
        let list = List::new(choices)
            .block(Block::default().borders(Borders::ALL))
            .highlight_style(Style::default().bg(Color::Yellow).fg(Color::Black));

        f.render_widget(Clear, area);
        f.render_widget(message, sections[0]);
        f.render_stateful_widget(list, sections[1], &mut ui_state.dialog_state);
        return;
    }

    if let Some(input) = &ui_state.picker {
        popup(
            f,
            "Choose folder",
            vec![Line::from(vec![Span::raw("> "), Span::raw(input.clone())])],
        );
    }
}
