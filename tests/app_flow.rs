use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use ai_tutor::ai::codec::encode_base64;
use ai_tutor::ai::{AiError, AiService, Operation, ProblemInput};
use ai_tutor::app::{App, Focus, Overlay};
use ai_tutor::audio::{AudioBuffer, AudioError, AudioSink, EndNotifier, SoundHandle};
use ai_tutor::config::Config;
use ai_tutor::event::AppEvent;
use ai_tutor::session::problem::{LoadingState, Phase, ProblemSession};
use ai_tutor::store::schema::SavedProblem;
use ai_tutor::store::slots::{MemorySlotStore, Slot, SlotStore};
use ai_tutor::ui::components::input_panel::InputField;
use ai_tutor::ui::components::solution_view::{AudioStatus, OutputTab};
use ai_tutor::ui::theme::Theme;

/// Store handle that stays inspectable after the session takes ownership.
#[derive(Clone, Default)]
struct SharedStore(Rc<RefCell<MemorySlotStore>>);

impl SlotStore for SharedStore {
    fn get(&self, slot: Slot) -> Option<String> {
        self.0.borrow().get(slot)
    }

    fn set(&mut self, slot: Slot, value: &str) -> anyhow::Result<()> {
        self.0.borrow_mut().set(slot, value)
    }

    fn remove(&mut self, slot: Slot) -> anyhow::Result<()> {
        self.0.borrow_mut().remove(slot)
    }
}

#[derive(Default)]
struct FakeService {
    fail_verify: bool,
    fail_solve: bool,
    fail_drills: bool,
    fail_speech: bool,
    solve_requests: Mutex<Vec<String>>,
    verify_calls: AtomicUsize,
    speech_calls: AtomicUsize,
}

impl AiService for FakeService {
    fn verify(&self, input: &ProblemInput) -> Result<String, AiError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_verify {
            return Err(AiError::EmptyResponse);
        }
        Ok(format!("Q: {}", input.text))
    }

    fn solve(&self, problem: &str) -> Result<String, AiError> {
        self.solve_requests.lock().unwrap().push(problem.to_string());
        if self.fail_solve {
            return Err(AiError::Status {
                status: 500,
                body: "boom".to_string(),
            });
        }
        Ok(format!("<h2>Answer</h2><p>{problem} = 4</p>"))
    }

    fn generate_drills(&self, _problem: &str, _solution: &str) -> Result<String, AiError> {
        if self.fail_drills {
            return Err(AiError::EmptyResponse);
        }
        Ok("<ol><li>3+3</li></ol>".to_string())
    }

    fn synthesize_speech(&self, _text: &str) -> Result<String, AiError> {
        self.speech_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_speech {
            return Err(AiError::EmptyAudio);
        }
        Ok(encode_base64(&[0x00, 0x00, 0xff, 0x7f, 0x00, 0x80]))
    }

    fn analyze_library(&self, problems: &[SavedProblem]) -> Result<String, AiError> {
        Ok(format!("<h1>Report</h1><p>{} problems</p>", problems.len()))
    }
}

#[derive(Default)]
struct SinkProbe {
    live: AtomicUsize,
    max_live: AtomicUsize,
    pending_ends: Mutex<Vec<EndNotifier>>,
}

struct ProbeHandle {
    probe: Arc<SinkProbe>,
    stopped: bool,
}

impl SoundHandle for ProbeHandle {
    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.probe.live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

struct ProbeSink(Arc<SinkProbe>);

impl AudioSink for ProbeSink {
    fn play(
        &mut self,
        _buffer: &AudioBuffer,
        on_end: EndNotifier,
    ) -> Result<Box<dyn SoundHandle>, AudioError> {
        let live = self.0.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.0.max_live.fetch_max(live, Ordering::SeqCst);
        self.0.pending_ends.lock().unwrap().push(on_end);
        Ok(Box::new(ProbeHandle {
            probe: Arc::clone(&self.0),
            stopped: false,
        }))
    }
}

struct Harness {
    app: App,
    rx: Receiver<AppEvent>,
    store: SharedStore,
    service: Arc<FakeService>,
    sink: Arc<SinkProbe>,
}

impl Harness {
    fn new(service: FakeService) -> Self {
        Self::with_store(service, SharedStore::default())
    }

    fn with_store(service: FakeService, store: SharedStore) -> Self {
        let (tx, rx) = mpsc::channel();
        let service = Arc::new(service);
        let sink = Arc::new(SinkProbe::default());
        let theme: &'static Theme = Box::leak(Box::new(Theme::default()));
        let session = ProblemSession::restore(Box::new(store.clone()));
        let app = App::new(
            Config::default(),
            theme,
            session,
            service.clone(),
            Box::new(ProbeSink(Arc::clone(&sink))),
            tx,
        );
        Self {
            app,
            rx,
            store,
            service,
            sink,
        }
    }

    fn type_text(&mut self, text: &str) {
        for ch in text.chars() {
            self.app
                .edit_focused(KeyEvent::new(KeyCode::Char(ch), KeyModifiers::NONE));
        }
    }

    /// Wait for one background event and apply it the way the main loop does.
    fn pump(&mut self) {
        match self
            .rx
            .recv_timeout(Duration::from_secs(5))
            .expect("no event from background work")
        {
            AppEvent::Ai(reply) => self.app.handle_ai_reply(reply),
            AppEvent::PlaybackEnded(id) => self.app.handle_playback_ended(id),
            _ => {}
        }
    }

    fn solved(service: FakeService, text: &str) -> Self {
        let mut h = Self::new(service);
        h.type_text(text);
        h.app.solve();
        h.pump();
        assert_eq!(h.app.session.loading_state(), LoadingState::Success);
        h
    }
}

#[test]
fn typed_text_is_persisted_as_it_changes() {
    let mut h = Harness::new(FakeService::default());
    h.type_text("2+2");
    assert_eq!(h.store.get(Slot::TextInput).as_deref(), Some("2+2"));

    for _ in 0..3 {
        h.app
            .edit_focused(KeyEvent::new(KeyCode::Backspace, KeyModifiers::NONE));
    }
    assert_eq!(h.store.get(Slot::TextInput), None);
}

#[test]
fn solve_without_verification_uses_raw_text() {
    let h = Harness::solved(FakeService::default(), "2+2");
    assert_eq!(*h.service.solve_requests.lock().unwrap(), vec!["2+2".to_string()]);
    assert!(h.app.session.focus_mode());
    assert!(!h.app.session.affordances().input_column);
    assert_eq!(h.app.focus, Focus::Output);
}

#[test]
fn verified_text_wins_over_typed_text() {
    let mut h = Harness::new(FakeService::default());
    h.type_text("2+2");
    h.app.verify();
    assert_eq!(h.app.session.phase(), Phase::Verifying);
    h.pump();

    assert_eq!(h.app.session.verification(), Some("Q: 2+2"));
    assert_eq!(h.app.focus, Focus::Input(InputField::Verification));
    assert_eq!(h.app.verification_input.value(), "Q: 2+2");

    h.type_text("?");
    assert_eq!(h.store.get(Slot::VerificationResult).as_deref(), Some("Q: 2+2?"));

    h.app.solve();
    h.pump();
    assert_eq!(*h.service.solve_requests.lock().unwrap(), vec!["Q: 2+2?".to_string()]);
    assert_eq!(h.app.session.text_input(), "2+2");
}

#[test]
fn second_verify_while_in_flight_is_rejected() {
    let mut h = Harness::new(FakeService::default());
    h.type_text("She go to school.");
    h.app.verify();
    h.app.verify();
    h.app.solve();
    assert!(h.app.status.is_some());
    h.pump();

    assert_eq!(h.service.verify_calls.load(Ordering::SeqCst), 1);
    assert!(h.service.solve_requests.lock().unwrap().is_empty());
    assert!(h.rx.recv_timeout(Duration::from_millis(100)).is_err());
}

#[test]
fn verify_with_nothing_to_submit_does_nothing() {
    let mut h = Harness::new(FakeService::default());
    h.type_text("   ");
    h.app.verify();
    assert_eq!(h.app.session.phase(), Phase::Idle);
    assert!(h.rx.recv_timeout(Duration::from_millis(100)).is_err());
}

#[test]
fn failed_recognition_shows_banner_and_stays_unverified() {
    let mut h = Harness::new(FakeService {
        fail_verify: true,
        ..FakeService::default()
    });
    h.type_text("2+2");
    h.app.verify();
    h.pump();

    assert_eq!(h.app.session.error(), Some(Operation::Recognize));
    assert_eq!(h.app.session.verification(), None);
    assert_eq!(h.app.session.phase(), Phase::Idle);
    assert!(h.app.overlay.is_none());
}

#[test]
fn failed_solve_sets_error_state() {
    let mut h = Harness::new(FakeService {
        fail_solve: true,
        ..FakeService::default()
    });
    h.type_text("2+2");
    h.app.solve();
    h.pump();

    assert_eq!(h.app.session.loading_state(), LoadingState::Error);
    assert_eq!(h.app.session.error(), Some(Operation::Solve));
    assert_eq!(h.store.get(Slot::Solution), None);
    assert!(!h.app.session.focus_mode());
}

#[test]
fn drills_land_in_their_own_tab() {
    let mut h = Harness::solved(FakeService::default(), "2+2");
    h.app.generate_drills();
    assert_eq!(h.app.output_tab, OutputTab::Drills);
    assert!(h.app.session.is_generating_drills());
    h.pump();

    assert_eq!(h.app.session.drills(), "<ol><li>3+3</li></ol>");
    assert_eq!(h.store.get(Slot::Drills).as_deref(), Some("<ol><li>3+3</li></ol>"));
}

#[test]
fn failed_drills_raise_an_alert_without_touching_loading_state() {
    let mut h = Harness::solved(
        FakeService {
            fail_drills: true,
            ..FakeService::default()
        },
        "2+2",
    );
    h.app.generate_drills();
    h.pump();

    assert_eq!(h.app.session.loading_state(), LoadingState::Success);
    assert!(matches!(
        &h.app.overlay,
        Some(Overlay::Alert(msg)) if *msg == Operation::Drills.failure_message()
    ));
}

#[test]
fn drills_need_a_solution() {
    let mut h = Harness::new(FakeService::default());
    h.app.generate_drills();
    assert!(!h.app.session.is_generating_drills());
    assert!(h.rx.recv_timeout(Duration::from_millis(100)).is_err());
}

#[test]
fn saves_prepend_and_survive_reload() {
    let mut h = Harness::solved(FakeService::default(), "2+2");
    h.app.open_save_dialog();
    assert!(matches!(h.app.overlay, Some(Overlay::SaveTags(_))));
    h.app.overlay = None;

    h.app.save_current("时态, 动词拼写，  ");
    h.app.save_current("");
    h.app.save_current("math");

    let problems = h.app.session.library().problems().to_vec();
    assert_eq!(problems.len(), 3);
    assert_eq!(problems[0].tags, vec!["math".to_string()]);
    assert_eq!(problems[2].tags, vec!["时态".to_string(), "动词拼写".to_string()]);
    assert!(problems[0].timestamp > problems[1].timestamp);
    assert_ne!(problems[0].id, problems[1].id);

    let reloaded = ProblemSession::restore(Box::new(h.store.clone()));
    assert_eq!(reloaded.library().problems(), problems.as_slice());
}

#[test]
fn reset_clears_only_the_solution() {
    let mut h = Harness::new(FakeService::default());
    h.type_text("2+2");
    h.app.verify();
    h.pump();
    h.app.solve();
    h.pump();

    h.app.request_reset();
    assert!(matches!(h.app.overlay, Some(Overlay::ConfirmReset)));
    h.app.overlay = None;
    h.app.confirm_reset();

    assert_eq!(h.app.session.solution(), "");
    assert_eq!(h.app.session.text_input(), "2+2");
    assert_eq!(h.app.session.verification(), Some("Q: 2+2"));
    assert_eq!(h.store.get(Slot::Solution), None);
    assert_eq!(h.store.get(Slot::TextInput).as_deref(), Some("2+2"));
}

#[test]
fn next_problem_clears_every_problem_slot() {
    let mut h = Harness::solved(FakeService::default(), "2+2");
    h.app.generate_drills();
    h.pump();
    h.app.save_current("");

    h.app.next_problem();

    for slot in [Slot::TextInput, Slot::VerificationResult, Slot::Solution, Slot::Drills] {
        assert_eq!(h.store.get(slot), None, "{slot:?} should be gone");
    }
    assert!(h.store.get(Slot::SavedProblems).is_some());
    assert_eq!(h.app.problem_input.value(), "");
    assert_eq!(h.app.focus, Focus::Input(InputField::Problem));
}

#[test]
fn solve_reply_arriving_after_next_problem_is_discarded() {
    let mut h = Harness::new(FakeService::default());
    h.type_text("2+2");
    h.app.solve();
    h.app.next_problem();
    h.pump();

    assert_eq!(h.app.session.solution(), "");
    assert_eq!(h.app.session.phase(), Phase::Idle);
    assert!(!h.app.session.focus_mode());
    assert_eq!(h.store.get(Slot::Solution), None);
    assert_eq!(h.app.focus, Focus::Input(InputField::Problem));
}

#[test]
fn deleting_unknown_id_is_a_noop() {
    let mut h = Harness::solved(FakeService::default(), "2+2");
    h.app.save_current("a");
    let before = h.store.get(Slot::SavedProblems);

    h.app.confirm_delete("does-not-exist");

    assert_eq!(h.app.session.library().len(), 1);
    assert_eq!(h.store.get(Slot::SavedProblems), before);
}

#[test]
fn library_load_favorite_and_delete() {
    let mut h = Harness::solved(FakeService::default(), "first");
    h.app.save_current("");
    h.app.next_problem();
    h.type_text("second");
    h.app.solve();
    h.pump();
    h.app.save_current("");
    h.app.next_problem();

    h.app.open_library();
    h.app.library_next();
    h.app.toggle_selected_favorite();
    let problems = h.app.session.library().problems();
    assert!(!problems[0].is_favorite);
    assert!(problems[1].is_favorite);

    h.app.load_selected();
    assert!(!h.app.library_open);
    assert_eq!(h.app.session.text_input(), "first");
    assert_eq!(h.app.session.verification(), Some("first"));
    assert_eq!(h.app.session.loading_state(), LoadingState::Success);
    assert!(h.app.session.focus_mode());

    h.app.open_library();
    h.app.request_delete_selected();
    let Some(Overlay::ConfirmDelete(id)) = h.app.overlay.take() else {
        panic!("expected delete confirmation");
    };
    h.app.confirm_delete(&id);
    assert_eq!(h.app.session.library().len(), 1);
    assert_eq!(h.app.library_selected, 0);
}

#[test]
fn audio_toggle_never_overlaps_handles() {
    let mut h = Harness::solved(FakeService::default(), "2+2");

    h.app.toggle_audio();
    h.app.toggle_audio();
    assert_eq!(h.app.audio_status(), AudioStatus::Generating);
    h.pump();
    assert_eq!(h.service.speech_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.app.audio_status(), AudioStatus::Playing);

    h.app.toggle_audio();
    assert_eq!(h.app.audio_status(), AudioStatus::Silent);
    assert_eq!(h.sink.live.load(Ordering::SeqCst), 0);

    h.app.toggle_audio();
    h.pump();
    assert_eq!(h.sink.max_live.load(Ordering::SeqCst), 1);

    // The first handle reporting its end late must not stop the second.
    let mut ends = std::mem::take(&mut *h.sink.pending_ends.lock().unwrap());
    assert_eq!(ends.len(), 2);
    let latest = ends.pop().unwrap();
    (ends.pop().unwrap())();
    h.pump();
    assert_eq!(h.app.audio_status(), AudioStatus::Playing);

    latest();
    h.pump();
    assert_eq!(h.app.audio_status(), AudioStatus::Silent);
}

#[test]
fn failed_speech_raises_alert() {
    let mut h = Harness::solved(
        FakeService {
            fail_speech: true,
            ..FakeService::default()
        },
        "2+2",
    );
    h.app.toggle_audio();
    h.pump();

    assert_eq!(h.app.audio_status(), AudioStatus::Silent);
    assert!(matches!(
        &h.app.overlay,
        Some(Overlay::Alert(msg)) if *msg == Operation::Speech.failure_message()
    ));
    assert_eq!(h.sink.max_live.load(Ordering::SeqCst), 0);
}

#[test]
fn analysis_report_opens_and_exports() {
    let mut h = Harness::new(FakeService::default());
    h.app.analyze_library();
    assert!(h.app.status.is_some());
    assert!(h.rx.recv_timeout(Duration::from_millis(100)).is_err());

    h.type_text("2+2");
    h.app.solve();
    h.pump();
    h.app.save_current("x");
    h.app.analyze_library();
    h.pump();

    let Some(Overlay::Report { html, .. }) = h.app.overlay.take() else {
        panic!("expected report overlay");
    };
    assert!(html.contains("1 problems"));

    let dir = tempfile::tempdir().unwrap();
    h.app.config.export_dir = dir.path().to_string_lossy().to_string();
    h.app.export_report(&html);
    let exported: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(exported.len(), 1);
    assert!(exported[0].starts_with("Learning_Analysis_"));
    assert!(exported[0].ends_with(".html"));
}

#[test]
fn restored_solution_is_shown_as_success() {
    let store = SharedStore::default();
    {
        let mut raw = store.clone();
        raw.put(Slot::TextInput, "2+2").unwrap();
        raw.put(Slot::Solution, "<p>4</p>").unwrap();
        raw.put(Slot::SavedProblems, "not json").unwrap();
    }
    let h = Harness::with_store(FakeService::default(), store);

    assert_eq!(h.app.session.loading_state(), LoadingState::Success);
    assert_eq!(h.app.session.phase(), Phase::Solved);
    assert_eq!(h.app.problem_input.value(), "2+2");
    assert!(h.app.session.library().is_empty());
}

#[test]
fn focus_toggle_only_reshapes_layout_with_a_solution() {
    let mut h = Harness::new(FakeService::default());
    h.app.toggle_focus_mode();
    assert!(h.app.session.focus_mode());
    assert!(h.app.session.affordances().input_column);

    let mut h = Harness::solved(FakeService::default(), "2+2");
    h.app.toggle_focus_mode();
    assert!(h.app.session.affordances().input_column);
    h.app.toggle_focus_mode();
    assert!(!h.app.session.affordances().input_column);
}

#[test]
fn tab_cycles_visible_fields() {
    let mut h = Harness::new(FakeService::default());
    assert_eq!(h.app.focus, Focus::Input(InputField::Problem));
    h.app.cycle_focus();
    assert_eq!(h.app.focus, Focus::Output);
    h.app.cycle_focus();
    assert_eq!(h.app.focus, Focus::Input(InputField::Problem));
}

#[test]
fn unreadable_image_path_raises_alert() {
    let mut h = Harness::new(FakeService::default());
    h.app.load_image_from("/nonexistent/scan.png");
    assert!(matches!(h.app.overlay, Some(Overlay::Alert(_))));
    assert!(h.app.session.selected_image().is_none());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scan.png");
    std::fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();
    h.app.overlay = None;
    h.app.load_image_from(&path.to_string_lossy());
    let image = h.app.session.selected_image().unwrap();
    assert_eq!(image.preview, "scan.png");
    assert_eq!(image.mime_type, "image/png");

    h.app.verify();
    h.pump();
    assert!(h.app.session.selected_image().is_none());
}
