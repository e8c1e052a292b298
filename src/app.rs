use std::sync::Arc;
use std::sync::mpsc::Sender;

use crossterm::event::KeyEvent;
use rust_i18n::t;
use tracing::{debug, info, warn};

use crate::ai::worker::{self, AiJob, AiReply};
use crate::ai::{AiError, AiService, Operation};
use crate::audio::{AudioSink, PlaybackController, PlaybackError, ToggleAction};
use crate::config::Config;
use crate::event::AppEvent;
use crate::image;
use crate::report;
use crate::session::problem::{ProblemSession, SessionError};
use crate::ui::components::input_panel::InputField;
use crate::ui::components::solution_view::{AudioStatus, OutputTab};
use crate::ui::line_input::LineInput;
use crate::ui::text_area::{InputResult, TextArea};
use crate::ui::theme::Theme;

/// Which pane receives typing on the workspace.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Focus {
    Input(InputField),
    Output,
}

/// Modal popups. At most one is open; it takes every key until closed.
pub enum Overlay {
    SaveTags(LineInput),
    ImagePath(LineInput),
    ConfirmReset,
    ConfirmDelete(String),
    Alert(String),
    Report { html: String, scroll: u16 },
}

pub struct App {
    pub theme: &'static Theme,
    pub config: Config,
    pub session: ProblemSession,
    pub playback: PlaybackController,
    pub problem_input: TextArea,
    pub verification_input: TextArea,
    pub focus: Focus,
    pub output_tab: OutputTab,
    pub output_scroll: u16,
    pub library_open: bool,
    pub library_selected: usize,
    pub overlay: Option<Overlay>,
    pub status: Option<String>,
    pub should_quit: bool,
    service: Arc<dyn AiService>,
    tx: Sender<AppEvent>,
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl App {
    pub fn new(
        config: Config,
        theme: &'static Theme,
        session: ProblemSession,
        service: Arc<dyn AiService>,
        sink: Box<dyn AudioSink>,
        tx: Sender<AppEvent>,
    ) -> Self {
        let end_tx = tx.clone();
        let playback = PlaybackController::new(
            sink,
            Arc::new(move |id| {
                let _ = end_tx.send(AppEvent::PlaybackEnded(id));
            }),
        );

        let mut app = Self {
            theme,
            config,
            session,
            playback,
            problem_input: TextArea::multiline(""),
            verification_input: TextArea::multiline(""),
            focus: Focus::Input(InputField::Problem),
            output_tab: OutputTab::Solution,
            output_scroll: 0,
            library_open: false,
            library_selected: 0,
            overlay: None,
            status: None,
            should_quit: false,
            service,
            tx,
        };
        app.sync_editors();
        app
    }

    /// Reload both editors from the session after a transition replaced
    /// their content.
    fn sync_editors(&mut self) {
        if self.problem_input.value() != self.session.text_input() {
            self.problem_input.set_value(self.session.text_input());
        }
        let verification = self.session.verification().unwrap_or("");
        if self.verification_input.value() != verification {
            self.verification_input.set_value(verification);
        }
        if self.focus == Focus::Input(InputField::Verification)
            && !self.session.affordances().verification_editor
        {
            self.focus = Focus::Input(InputField::Problem);
        }
        if !self.session.affordances().input_column {
            self.focus = Focus::Output;
        }
    }

    fn dispatch(&self, job: AiJob) {
        worker::spawn_job(Arc::clone(&self.service), job, self.tx.clone());
    }

    fn alert(&mut self, message: String) {
        self.overlay = Some(Overlay::Alert(message));
    }

    pub fn audio_status(&self) -> AudioStatus {
        if self.playback.is_playing() {
            AudioStatus::Playing
        } else if self.playback.is_generating() {
            AudioStatus::Generating
        } else {
            AudioStatus::Silent
        }
    }

    // Editing

    pub fn edit_focused(&mut self, key: KeyEvent) {
        match self.focus {
            Focus::Input(InputField::Problem) => {
                if self.problem_input.handle(key) == InputResult::Changed {
                    let text = self.problem_input.value().to_string();
                    self.session.set_text_input(&text);
                }
            }
            Focus::Input(InputField::Verification) => {
                if self.verification_input.handle(key) == InputResult::Changed {
                    let text = self.verification_input.value().to_string();
                    self.session.set_verification(&text);
                    self.sync_editors();
                }
            }
            Focus::Output => {}
        }
    }

    /// Cycle focus through the visible editors and the output pane.
    pub fn cycle_focus(&mut self) {
        let affordances = self.session.affordances();
        let mut order = Vec::new();
        if affordances.input_column {
            order.push(Focus::Input(InputField::Problem));
            if affordances.verification_editor {
                order.push(Focus::Input(InputField::Verification));
            }
        }
        order.push(Focus::Output);
        let pos = order.iter().position(|f| *f == self.focus);
        self.focus = match pos {
            Some(i) => order[(i + 1) % order.len()],
            None => order[0],
        };
    }

    pub fn switch_output_tab(&mut self) {
        self.output_tab = match self.output_tab {
            OutputTab::Solution => OutputTab::Drills,
            OutputTab::Drills => OutputTab::Solution,
        };
        self.output_scroll = 0;
    }

    pub fn scroll_output(&mut self, delta: i32) {
        self.output_scroll = (self.output_scroll as i32 + delta).clamp(0, u16::MAX as i32) as u16;
    }

    pub fn toggle_focus_mode(&mut self) {
        self.session.toggle_focus_mode();
        self.sync_editors();
    }

    // AI actions

    fn rejected(&mut self, action: &str, err: SessionError) {
        debug!(action, "request rejected: {err}");
        self.status = match err {
            SessionError::NoSolution => Some(t!("error.no_solution").to_string()),
            SessionError::Busy(_) | SessionError::NotAvailable { .. } => {
                Some(t!("error.busy").to_string())
            }
            SessionError::EmptyLibrary => Some(t!("error.empty_library").to_string()),
            SessionError::EmptyInput => None,
        };
    }

    pub fn verify(&mut self) {
        match self.session.begin_verify() {
            Ok(input) => {
                self.sync_editors();
                self.dispatch(AiJob::Verify(input));
            }
            Err(e) => self.rejected("verify", e),
        }
    }

    pub fn solve(&mut self) {
        match self.session.begin_solve() {
            Ok(problem) => {
                self.output_tab = OutputTab::Solution;
                self.output_scroll = 0;
                self.dispatch(AiJob::Solve(problem));
            }
            Err(e) => self.rejected("solve", e),
        }
    }

    pub fn generate_drills(&mut self) {
        match self.session.begin_drills() {
            Ok((problem, solution)) => {
                self.output_tab = OutputTab::Drills;
                self.output_scroll = 0;
                self.dispatch(AiJob::Drills { problem, solution });
            }
            Err(e) => self.rejected("drills", e),
        }
    }

    /// Start narration of the solution, or stop it if it is playing.
    pub fn toggle_audio(&mut self) {
        if self.session.solution().is_empty() && !self.playback.is_playing() {
            self.rejected("speech", SessionError::NoSolution);
            return;
        }
        match self.playback.toggle() {
            ToggleAction::Generate => self.dispatch(AiJob::Speech {
                text: self.session.solution().to_string(),
                sample_rate: self.config.sample_rate,
            }),
            ToggleAction::Stopped => debug!("narration stopped by user"),
            ToggleAction::Ignored => debug!("narration already being generated"),
        }
    }

    pub fn analyze_library(&mut self) {
        match self.session.begin_analysis() {
            Ok(problems) => self.dispatch(AiJob::Analysis(problems)),
            Err(e) => self.rejected("analysis", e),
        }
    }

    fn report_failure(operation: Operation, err: &AiError) {
        warn!(operation = operation.as_str(), "AI request failed: {err}");
    }

    pub fn handle_ai_reply(&mut self, reply: AiReply) {
        match reply {
            AiReply::Verified(result) => {
                if let Err(e) = self.session.finish_verify(result) {
                    Self::report_failure(Operation::Recognize, &e);
                }
                if self.session.affordances().verification_editor {
                    self.focus = Focus::Input(InputField::Verification);
                }
                self.sync_editors();
            }
            AiReply::Solved(result) => {
                if let Err(e) = self.session.finish_solve(result) {
                    Self::report_failure(Operation::Solve, &e);
                }
                self.sync_editors();
            }
            AiReply::Drills(result) => {
                if let Err(e) = self.session.finish_drills(result) {
                    Self::report_failure(Operation::Drills, &e);
                    self.alert(Operation::Drills.failure_message());
                }
            }
            AiReply::Speech(result) => match self.playback.finish_generation(result) {
                Ok(()) => {}
                Err(PlaybackError::Speech(e)) => {
                    Self::report_failure(Operation::Speech, &e);
                    self.alert(Operation::Speech.failure_message());
                }
                Err(PlaybackError::Device(e)) => {
                    warn!("audio output failed: {e}");
                    self.alert(Operation::Speech.failure_message());
                }
            },
            AiReply::Analysis(result) => match self.session.finish_analysis(result) {
                Ok(html) => {
                    info!(chars = html.chars().count(), "learning analysis ready");
                    self.overlay = Some(Overlay::Report { html, scroll: 0 });
                }
                Err(e) => {
                    Self::report_failure(Operation::Analysis, &e);
                    self.alert(Operation::Analysis.failure_message());
                }
            },
        }
    }

    pub fn handle_playback_ended(&mut self, id: u64) {
        self.playback.handle_ended(id);
    }

    // Problem lifecycle

    pub fn open_save_dialog(&mut self) {
        if self.session.solution().is_empty() {
            self.rejected("save", SessionError::NoSolution);
            return;
        }
        self.overlay = Some(Overlay::SaveTags(LineInput::new("")));
    }

    pub fn save_current(&mut self, tag_entry: &str) {
        self.session.save(tag_entry, now_ms());
        self.library_selected = 0;
        self.status = Some(t!("status.saved").to_string());
    }

    pub fn next_problem(&mut self) {
        self.playback.stop();
        self.session.next_problem();
        self.session.clear_image();
        self.output_tab = OutputTab::Solution;
        self.output_scroll = 0;
        self.focus = Focus::Input(InputField::Problem);
        self.status = None;
        self.sync_editors();
    }

    pub fn request_reset(&mut self) {
        if !self.session.solution().is_empty() {
            self.overlay = Some(Overlay::ConfirmReset);
        }
    }

    pub fn confirm_reset(&mut self) {
        self.playback.stop();
        self.session.clear_solution();
        self.output_scroll = 0;
        self.sync_editors();
    }

    // Image

    pub fn open_image_prompt(&mut self) {
        if self.session.affordances().verify_button {
            self.overlay = Some(Overlay::ImagePath(LineInput::path("")));
        }
    }

    pub fn load_image_from(&mut self, raw_path: &str) {
        let path = image::expand_home(raw_path.trim());
        match image::load_image(&path) {
            Ok(selected) => {
                self.status = Some(t!("status.image_loaded", name = selected.preview.as_str()).to_string());
                self.session.select_image(selected);
            }
            Err(e) => {
                warn!(path = %path.display(), "image load failed: {e:#}");
                self.alert(t!("error.image", reason = format!("{e}")).to_string());
            }
        }
    }

    pub fn clear_image(&mut self) {
        self.session.clear_image();
    }

    // Library

    pub fn open_library(&mut self) {
        self.library_open = true;
        let len = self.session.library().len();
        self.library_selected = self.library_selected.min(len.saturating_sub(1));
    }

    pub fn close_library(&mut self) {
        self.library_open = false;
    }

    pub fn library_next(&mut self) {
        let len = self.session.library().len();
        if len > 0 {
            self.library_selected = (self.library_selected + 1).min(len - 1);
        }
    }

    pub fn library_prev(&mut self) {
        self.library_selected = self.library_selected.saturating_sub(1);
    }

    fn selected_problem_id(&self) -> Option<String> {
        self.session
            .library()
            .problems()
            .get(self.library_selected)
            .map(|p| p.id.clone())
    }

    pub fn load_selected(&mut self) {
        let Some(id) = self.selected_problem_id() else {
            return;
        };
        self.playback.stop();
        if self.session.load_saved(&id) {
            self.library_open = false;
            self.output_tab = OutputTab::Solution;
            self.output_scroll = 0;
            self.sync_editors();
        }
    }

    pub fn toggle_selected_favorite(&mut self) {
        if let Some(id) = self.selected_problem_id() {
            self.session.toggle_favorite(&id);
        }
    }

    pub fn request_delete_selected(&mut self) {
        if let Some(id) = self.selected_problem_id() {
            self.overlay = Some(Overlay::ConfirmDelete(id));
        }
    }

    pub fn confirm_delete(&mut self, id: &str) {
        if self.session.delete_saved(id) {
            let len = self.session.library().len();
            self.library_selected = self.library_selected.min(len.saturating_sub(1));
        }
    }

    // Report

    pub fn export_report(&mut self, html: &str) {
        let dir = self.config.export_path();
        match report::save_export(&dir, html, &report::page_styles(), now_ms()) {
            Ok(path) => {
                self.status = Some(t!("status.exported", path = path.display().to_string()).to_string());
            }
            Err(e) => {
                warn!(dir = %dir.display(), "report export failed: {e:#}");
                self.alert(t!("error.export", reason = format!("{e}")).to_string());
            }
        }
    }

    pub fn print_report(&mut self, html: &str) {
        let title = t!("dialog.report_title").to_string();
        match report::open_print_preview(
            html,
            &report::page_styles(),
            &title,
            self.config.print_delay_ms,
            now_ms(),
        ) {
            Ok(_) => self.status = Some(t!("status.printing").to_string()),
            Err(e) => warn!("print preview failed: {e:#}"),
        }
    }
}
