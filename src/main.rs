use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Clear, Paragraph, Widget};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ai_tutor::ai::{AiService, OfflineService};
use ai_tutor::app::{App, Focus, Overlay};
use ai_tutor::audio::cpal_sink::CpalSink;
use ai_tutor::config::Config;
use ai_tutor::event::{AppEvent, EventHandler};
use ai_tutor::session::problem::ProblemSession;
use ai_tutor::store::slots::{FileSlotStore, MemorySlotStore, SlotStore};
use ai_tutor::tr;
use ai_tutor::ui::components::dialog::{Dialog, DialogBody};
use ai_tutor::ui::components::input_panel::InputPanel;
use ai_tutor::ui::components::library_list::LibraryList;
use ai_tutor::ui::components::report_view::ReportView;
use ai_tutor::ui::components::solution_view::SolutionView;
use ai_tutor::ui::layout::{AppLayout, centered_rect, pack_hint_lines};
use ai_tutor::ui::text_area::InputResult;
use ai_tutor::ui::theme::Theme;

#[derive(Parser)]
#[command(name = "ai-tutor", version, about = "Terminal English tutor backed by a generative AI service")]
struct Cli {
    #[arg(short, long, help = "Theme name")]
    theme: Option<String>,

    #[arg(short, long, help = "Interface language (zh-CN, en)")]
    locale: Option<String>,

    #[arg(long, help = "Directory for saved session state and the log file")]
    data_dir: Option<PathBuf>,

    #[arg(short, long, help = "Image to attach to the first problem")]
    image: Option<PathBuf>,

    #[arg(long, help = "Keep everything in memory for this run")]
    no_persist: bool,
}

fn init_logging(data_dir: &Path, level: &str) -> Result<()> {
    fs::create_dir_all(data_dir)?;
    let file = File::options()
        .create(true)
        .append(true)
        .open(data_dir.join("ai-tutor.log"))?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

#[cfg(feature = "network")]
fn build_service(config: &Config) -> Arc<dyn AiService> {
    match ai_tutor::ai::gemini::GeminiClient::from_config(config) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            warn!("AI requests disabled: {e}");
            Arc::new(OfflineService)
        }
    }
}

#[cfg(not(feature = "network"))]
fn build_service(_config: &Config) -> Arc<dyn AiService> {
    Arc::new(OfflineService)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load().unwrap_or_default();
    if let Some(locale) = cli.locale {
        config.locale = locale;
        config.validate();
    }
    if let Some(theme_name) = cli.theme {
        config.theme = theme_name;
    }

    let data_dir = cli.data_dir.unwrap_or_else(FileSlotStore::default_dir);
    init_logging(&data_dir, &config.log_level)?;
    rust_i18n::set_locale(&config.locale);
    info!(version = env!("CARGO_PKG_VERSION"), locale = %config.locale, "starting");

    let theme: &'static Theme = Box::leak(Box::new(Theme::load(&config.theme).unwrap_or_default()));
    let store: Box<dyn SlotStore> = if cli.no_persist {
        Box::new(MemorySlotStore::new())
    } else {
        Box::new(FileSlotStore::with_base_dir(data_dir)?)
    };
    let session = ProblemSession::restore(store);
    let service = build_service(&config);

    let events = EventHandler::new(Duration::from_millis(250));
    let mut app = App::new(
        config,
        theme,
        session,
        service,
        Box::new(CpalSink),
        events.sender(),
    );
    if let Some(path) = cli.image {
        app.load_image_from(&path.to_string_lossy());
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app, &events);

    app.playback.stop();
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = result {
        eprintln!("Error: {err:?}");
    }
    info!("exiting");

    Ok(())
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    events: &EventHandler,
) -> Result<()> {
    loop {
        terminal.draw(|frame| render(frame, app))?;

        match events.next()? {
            AppEvent::Key(key) => handle_key(app, key),
            AppEvent::Ai(reply) => app.handle_ai_reply(reply),
            AppEvent::PlaybackEnded(id) => app.handle_playback_ended(id),
            AppEvent::Tick | AppEvent::Resize(_, _) => {}
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    if key.kind != KeyEventKind::Press {
        return;
    }

    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    if ctrl && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('q')) {
        app.should_quit = true;
        return;
    }

    if app.overlay.is_some() {
        handle_overlay_key(app, key);
    } else if app.library_open {
        handle_library_key(app, key);
    } else {
        handle_workspace_key(app, key);
    }
}

fn handle_workspace_key(app: &mut App, key: KeyEvent) {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('r') => return app.verify(),
            KeyCode::Char('s') => return app.solve(),
            KeyCode::Char('d') => return app.generate_drills(),
            KeyCode::Char('p') => return app.toggle_audio(),
            KeyCode::Char('b') => return app.open_save_dialog(),
            KeyCode::Char('n') => return app.next_problem(),
            KeyCode::Char('z') => return app.request_reset(),
            KeyCode::Char('l') => return app.open_library(),
            KeyCode::Char('f') => return app.toggle_focus_mode(),
            KeyCode::Char('o') => return app.open_image_prompt(),
            KeyCode::Char('x') => return app.clear_image(),
            _ => {}
        }
    }

    match (key.code, app.focus) {
        (KeyCode::Tab, _) => app.cycle_focus(),
        (KeyCode::Left | KeyCode::Right | KeyCode::Char('t'), Focus::Output) => {
            app.switch_output_tab()
        }
        (KeyCode::Down | KeyCode::Char('j'), Focus::Output) => app.scroll_output(1),
        (KeyCode::Up | KeyCode::Char('k'), Focus::Output) => app.scroll_output(-1),
        (KeyCode::PageDown, Focus::Output) => app.scroll_output(10),
        (KeyCode::PageUp, Focus::Output) => app.scroll_output(-10),
        (KeyCode::Home, Focus::Output) => app.output_scroll = 0,
        _ => app.edit_focused(key),
    }
}

fn handle_library_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => app.close_library(),
        KeyCode::Char('l') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.close_library()
        }
        KeyCode::Down | KeyCode::Char('j') => app.library_next(),
        KeyCode::Up | KeyCode::Char('k') => app.library_prev(),
        KeyCode::Enter => app.load_selected(),
        KeyCode::Char('f') => app.toggle_selected_favorite(),
        KeyCode::Char('x') | KeyCode::Delete => app.request_delete_selected(),
        KeyCode::Char('a') => app.analyze_library(),
        _ => {}
    }
}

fn handle_overlay_key(app: &mut App, key: KeyEvent) {
    let Some(mut overlay) = app.overlay.take() else {
        return;
    };

    let keep_open = match &mut overlay {
        Overlay::SaveTags(input) => match input.handle(key) {
            InputResult::Submit => {
                let tags = input.value().to_string();
                app.save_current(&tags);
                false
            }
            InputResult::Cancel => false,
            _ => true,
        },
        Overlay::ImagePath(input) => match input.handle(key) {
            InputResult::Submit => {
                let path = input.value().to_string();
                if !path.trim().is_empty() {
                    app.load_image_from(&path);
                }
                false
            }
            InputResult::Cancel => false,
            _ => true,
        },
        Overlay::ConfirmReset => match key.code {
            KeyCode::Char('y') | KeyCode::Enter => {
                app.confirm_reset();
                false
            }
            KeyCode::Char('n') | KeyCode::Esc => false,
            _ => true,
        },
        Overlay::ConfirmDelete(id) => match key.code {
            KeyCode::Char('y') | KeyCode::Enter => {
                app.confirm_delete(id);
                false
            }
            KeyCode::Char('n') | KeyCode::Esc => false,
            _ => true,
        },
        Overlay::Alert(_) => !matches!(key.code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ')),
        Overlay::Report { html, scroll } => match key.code {
            KeyCode::Esc | KeyCode::Char('q') => false,
            KeyCode::Down | KeyCode::Char('j') => {
                *scroll = scroll.saturating_add(1);
                true
            }
            KeyCode::Up | KeyCode::Char('k') => {
                *scroll = scroll.saturating_sub(1);
                true
            }
            KeyCode::PageDown => {
                *scroll = scroll.saturating_add(10);
                true
            }
            KeyCode::PageUp => {
                *scroll = scroll.saturating_sub(10);
                true
            }
            KeyCode::Char('e') => {
                app.export_report(html);
                true
            }
            KeyCode::Char('p') => {
                app.print_report(html);
                true
            }
            _ => true,
        },
    };

    // An action inside the overlay may have raised an alert; it wins.
    if keep_open && app.overlay.is_none() {
        app.overlay = Some(overlay);
    }
}

fn workspace_hints(app: &App) -> Vec<String> {
    let affordances = app.session.affordances();
    let mut keys = Vec::new();
    if affordances.verify_button {
        keys.extend(["hint.verify", "hint.image"]);
    }
    keys.push("hint.solve");
    if affordances.learning_actions {
        keys.extend(["hint.drills", "hint.audio", "hint.save", "hint.next", "hint.reset"]);
    }
    keys.extend(["hint.library", "hint.focus", "hint.tab", "hint.quit"]);
    keys.into_iter().map(tr).collect()
}

fn render(frame: &mut ratatui::Frame, app: &App) {
    let area = frame.area();
    let colors = &app.theme.colors;

    let hints = if app.library_open {
        vec![tr("hint.library_keys")]
    } else {
        workspace_hints(app)
    };
    let hint_refs: Vec<&str> = hints.iter().map(String::as_str).collect();
    let footer_lines = pack_hint_lines(&hint_refs, area.width as usize);

    let affordances = app.session.affordances();
    let layout = AppLayout::new(area, affordances.input_column, footer_lines.len() as u16);

    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            format!(" {} ", tr("app.title")),
            Style::default()
                .fg(colors.header_fg())
                .bg(colors.header_bg())
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            app.status
                .as_deref()
                .map(|s| format!("  {s}"))
                .unwrap_or_default(),
            Style::default().fg(colors.text_muted()),
        ),
    ]))
    .style(Style::default().bg(colors.bg()));
    frame.render_widget(header, layout.header);

    if let Some(input_area) = layout.input {
        let panel = InputPanel {
            session: &app.session,
            problem: &app.problem_input,
            verification: &app.verification_input,
            focus: match app.focus {
                Focus::Input(field) => Some(field),
                Focus::Output => None,
            },
            theme: app.theme,
        };
        frame.render_widget(&panel, input_area);
    }

    let solution = SolutionView {
        session: &app.session,
        tab: app.output_tab,
        scroll: app.output_scroll,
        audio: app.audio_status(),
        focused: app.focus == Focus::Output,
        theme: app.theme,
    };
    frame.render_widget(&solution, layout.output);

    let footer_text: Vec<Line> = footer_lines
        .into_iter()
        .map(|l| Line::from(Span::styled(l, Style::default().fg(colors.text_muted()))))
        .collect();
    frame.render_widget(
        Paragraph::new(footer_text).style(Style::default().bg(colors.bg())),
        layout.footer,
    );

    if app.library_open {
        render_library(frame, app, layout.output.union(layout.input.unwrap_or(layout.output)));
    }
    if let Some(overlay) = &app.overlay {
        render_overlay(frame, app, overlay);
    }
}

/// Right-docked panel over the workspace body.
fn render_library(frame: &mut ratatui::Frame, app: &App, body: Rect) {
    let width = (body.width * 2 / 5).max(40).min(body.width);
    let panel = Rect::new(body.x + body.width - width, body.y, width, body.height);
    frame.render_widget(Clear, panel);
    let list = LibraryList {
        problems: app.session.library().problems(),
        selected: app.library_selected,
        theme: app.theme,
    };
    frame.render_widget(&list, panel);

    if app.session.is_analyzing_library() {
        let colors = &app.theme.colors;
        let status_row = Rect::new(
            panel.x + 1,
            panel.y + panel.height.saturating_sub(2),
            panel.width.saturating_sub(2),
            1,
        );
        Paragraph::new(Span::styled(
            tr("status.analysis_pending"),
            Style::default().fg(colors.highlight()),
        ))
        .alignment(Alignment::Center)
        .render(status_row, frame.buffer_mut());
    }
}

fn render_overlay(frame: &mut ratatui::Frame, app: &App, overlay: &Overlay) {
    let area = frame.area();
    if let Overlay::Report { html, scroll } = overlay {
        let title = tr("dialog.report_title");
        let hint = tr("dialog.report_hint");
        let view = ReportView {
            html,
            title: &title,
            hint: &hint,
            scroll: *scroll,
            theme: app.theme,
        };
        frame.render_widget(&view, centered_rect(80, 85, area));
        return;
    }

    let (title, body, hint) = match overlay {
        Overlay::SaveTags(input) => (
            tr("dialog.save_title"),
            (tr("dialog.save_prompt"), Some(input)),
            tr("dialog.input_hint"),
        ),
        Overlay::ImagePath(input) => (
            tr("dialog.image_title"),
            (tr("dialog.image_prompt"), Some(input)),
            tr("dialog.input_hint"),
        ),
        Overlay::ConfirmReset => (
            tr("dialog.reset_title"),
            (tr("dialog.reset_prompt"), None),
            tr("dialog.confirm_hint"),
        ),
        Overlay::ConfirmDelete(_) => (
            tr("dialog.delete_title"),
            (tr("dialog.delete_prompt"), None),
            tr("dialog.confirm_hint"),
        ),
        Overlay::Alert(message) => (
            tr("app.title"),
            (message.clone(), None),
            tr("dialog.alert_hint"),
        ),
        Overlay::Report { .. } => return,
    };

    let (text, input) = body;
    let body = match (overlay, input) {
        (_, Some(input)) => DialogBody::Prompt { label: &text, input },
        (Overlay::Alert(_), None) => DialogBody::Alert(&text),
        _ => DialogBody::Confirm(&text),
    };
    let dialog = Dialog {
        title: &title,
        body,
        hint: &hint,
        theme: app.theme,
    };
    frame.render_widget(&dialog, centered_rect(50, 30, area));
}
