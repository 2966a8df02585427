use super::*;
use crate::audio::{self, AudioSource};
use crate::dispatch::EventQueue;
use crate::journal::EventJournal;
use crate::link::memory::{RecordingWriter, ScriptedReader};
use crate::link::Link;
use std::cell::RefCell;
use std::env;
use std::fs;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn scratch_log(name: &str) -> PathBuf {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let path = env::temp_dir().join(format!(
        "groundlink_voice_{name}_{}_{n}.csv",
        std::process::id()
    ));
    let _ = fs::remove_file(&path);
    path
}

fn short_config() -> VoiceConfig {
    VoiceConfig {
        capture: Duration::from_millis(200),
        sample_rate: 16_000,
        numcep: 13,
    }
}

/// Tone generator that counts how often it was asked to record.
struct ToneSource {
    captures: Arc<AtomicUsize>,
    fail: bool,
    silent_empty: bool,
}

impl ToneSource {
    fn new() -> (Self, Arc<AtomicUsize>) {
        let captures = Arc::new(AtomicUsize::new(0));
        (
            Self {
                captures: Arc::clone(&captures),
                fail: false,
                silent_empty: false,
            },
            captures,
        )
    }
}

impl AudioSource for ToneSource {
    fn describe(&self) -> String {
        "tone".to_string()
    }

    fn capture(&mut self, duration: Duration, sample_rate: u32) -> anyhow::Result<Vec<f32>> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("device unplugged");
        }
        if self.silent_empty {
            return Ok(Vec::new());
        }
        let len = (duration.as_secs_f64() * f64::from(sample_rate)) as usize;
        Ok((0..len)
            .map(|i| (i as f32 * 440.0 * std::f32::consts::TAU / sample_rate as f32).sin() * 0.3)
            .collect())
    }
}

/// Always answers with the same label.
struct FixedLabel {
    label: i64,
    len: usize,
}

impl Classifier for FixedLabel {
    fn feature_len(&self) -> usize {
        self.len
    }

    fn predict(&self, features: &FeatureVector) -> Result<i64, VoicePipelineError> {
        assert_eq!(features.len(), self.len);
        Ok(self.label)
    }
}

fn classifier(label: i64) -> Option<Arc<dyn Classifier>> {
    let classifier: Arc<dyn Classifier> = Arc::new(FixedLabel { label, len: 13 });
    Some(classifier)
}

struct Rig {
    sender: CommandSender,
    recorder: RecordingWriter,
    journal: Arc<EventJournal>,
    path: PathBuf,
}

impl Rig {
    fn new(name: &str) -> Self {
        let path = scratch_log(name);
        let journal = Arc::new(EventJournal::open(&path).expect("open journal"));
        let recorder = RecordingWriter::new();
        let link = Link::new(
            "voice-test",
            Box::new(ScriptedReader::from_lines(Vec::<String>::new())),
            Box::new(recorder.clone()),
        );
        let (_, writer) = link.into_parts();
        Self {
            sender: CommandSender::new(writer, Arc::clone(&journal)),
            recorder,
            journal,
            path,
        }
    }

    fn logged(&self) -> Vec<String> {
        self.journal
            .query("")
            .expect("query")
            .into_iter()
            .map(|record| record.description)
            .collect()
    }
}

impl Drop for Rig {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn run_collecting(
    pipeline: &VoicePipeline,
    sender: &CommandSender,
) -> (Result<VoiceOutcome, VoicePipelineError>, Vec<VoiceStage>) {
    let mut stages = Vec::new();
    let result = pipeline.run(sender, &mut |stage| stages.push(stage));
    (result, stages)
}

#[test]
fn label_one_sends_only_on() {
    let rig = Rig::new("on");
    let (source, captures) = ToneSource::new();
    let pipeline = VoicePipeline::new(Some(audio::shared(source)), classifier(1), short_config());

    let (result, stages) = run_collecting(&pipeline, &rig.sender);
    let outcome = result.expect("voice run");
    assert_eq!(outcome.label, 1);
    assert_eq!(outcome.command, Command::TurnOn);
    assert_eq!(outcome.log_error, None);
    assert_eq!(rig.recorder.raw(), "ON\n");
    assert_eq!(rig.logged(), vec!["Voice Command: ON".to_string()]);
    assert_eq!(captures.load(Ordering::SeqCst), 1);
    assert_eq!(
        stages,
        vec![
            VoiceStage::Capturing,
            VoiceStage::Extracting,
            VoiceStage::Classifying,
            VoiceStage::Dispatched,
        ]
    );
}

#[test]
fn label_zero_sends_only_off() {
    let rig = Rig::new("off");
    let (source, _) = ToneSource::new();
    let pipeline = VoicePipeline::new(Some(audio::shared(source)), classifier(0), short_config());

    let outcome = pipeline.run(&rig.sender, &mut |_| {}).expect("voice run");
    assert_eq!(outcome.command, Command::TurnOff);
    assert_eq!(rig.recorder.raw(), "OFF\n");
    assert_eq!(rig.logged(), vec!["Voice Command: OFF".to_string()]);
}

#[test]
fn unexpected_label_sends_nothing() {
    let rig = Rig::new("label2");
    let (source, _) = ToneSource::new();
    let pipeline = VoicePipeline::new(Some(audio::shared(source)), classifier(2), short_config());

    let (result, stages) = run_collecting(&pipeline, &rig.sender);
    assert!(matches!(result, Err(VoicePipelineError::UnexpectedLabel(2))));
    assert!(!stages.contains(&VoiceStage::Dispatched));
    assert!(rig.recorder.raw().is_empty());
    assert!(rig.logged().is_empty());
}

#[test]
fn missing_classifier_fails_before_capture() {
    let rig = Rig::new("noclassifier");
    let (source, captures) = ToneSource::new();
    let pipeline = VoicePipeline::new(Some(audio::shared(source)), None, short_config());

    let (result, stages) = run_collecting(&pipeline, &rig.sender);
    assert!(matches!(result, Err(VoicePipelineError::ClassifierNotLoaded)));
    assert!(stages.is_empty());
    assert_eq!(captures.load(Ordering::SeqCst), 0);
    assert!(rig.recorder.raw().is_empty());
}

#[test]
fn missing_audio_is_reported() {
    let rig = Rig::new("noaudio");
    let pipeline = VoicePipeline::new(None, classifier(1), short_config());
    assert!(matches!(
        pipeline.preflight(),
        Err(VoicePipelineError::AudioUnavailable)
    ));
    assert!(matches!(
        pipeline.run(&rig.sender, &mut |_| {}),
        Err(VoicePipelineError::AudioUnavailable)
    ));
}

#[test]
fn capture_failures_abort_the_run() {
    let rig = Rig::new("capture");
    let (mut source, _) = ToneSource::new();
    source.fail = true;
    let pipeline = VoicePipeline::new(Some(audio::shared(source)), classifier(1), short_config());
    let err = pipeline
        .run(&rig.sender, &mut |_| {})
        .expect_err("capture error");
    assert!(matches!(&err, VoicePipelineError::Capture(reason) if reason.contains("device unplugged")));

    let (mut source, _) = ToneSource::new();
    source.silent_empty = true;
    let pipeline = VoicePipeline::new(Some(audio::shared(source)), classifier(1), short_config());
    assert!(matches!(
        pipeline.run(&rig.sender, &mut |_| {}),
        Err(VoicePipelineError::EmptyCapture)
    ));
    assert!(rig.recorder.raw().is_empty());
}

#[test]
fn feature_count_mismatch_fails_preflight() {
    let (source, captures) = ToneSource::new();
    let config = VoiceConfig {
        numcep: 20,
        ..short_config()
    };
    let pipeline = VoicePipeline::new(Some(audio::shared(source)), classifier(1), config);
    assert!(matches!(
        pipeline.preflight(),
        Err(VoicePipelineError::FeatureLength {
            expected: 13,
            actual: 20
        })
    ));
    assert_eq!(captures.load(Ordering::SeqCst), 0);
}

#[test]
fn closed_link_surfaces_send_error() {
    let rig = Rig::new("closed");
    rig.sender.writer().close();
    let (source, _) = ToneSource::new();
    let pipeline = VoicePipeline::new(Some(audio::shared(source)), classifier(1), short_config());

    let (result, stages) = run_collecting(&pipeline, &rig.sender);
    assert!(matches!(result, Err(VoicePipelineError::Send(LinkError::Closed))));
    assert!(!stages.contains(&VoiceStage::Dispatched));
    assert!(rig.logged().is_empty());
}

#[test]
fn job_reports_progress_through_queue() {
    let rig = Rig::new("job");
    let (source, _) = ToneSource::new();
    let pipeline = Arc::new(VoicePipeline::new(
        Some(audio::shared(source)),
        classifier(1),
        short_config(),
    ));
    let mut queue = EventQueue::new();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    queue.subscribe_voice(move |update| sink.borrow_mut().push(update.clone()));

    let job = start_voice_job(pipeline, rig.sender.clone(), queue.sender()).expect("start");
    let outcome = job.wait().expect("voice run");
    assert_eq!(outcome.command, Command::TurnOn);

    // Nothing is delivered until the consumer drains.
    assert!(seen.borrow().is_empty());
    assert_eq!(queue.drain(), 5);
    let seen = seen.borrow();
    assert_eq!(
        seen.first(),
        Some(&VoiceUpdate::Stage {
            stage: VoiceStage::Capturing
        })
    );
    assert_eq!(seen.last(), Some(&VoiceUpdate::Completed { outcome }));
    assert_eq!(rig.recorder.raw(), "ON\n");
}

#[test]
fn preflight_failure_starts_no_job() {
    let rig = Rig::new("nojob");
    let pipeline = Arc::new(VoicePipeline::new(None, classifier(1), short_config()));
    let mut queue = EventQueue::new();
    let result = start_voice_job(pipeline, rig.sender.clone(), queue.sender());
    assert!(matches!(result, Err(VoicePipelineError::AudioUnavailable)));
    assert_eq!(queue.drain(), 0);
}

#[test]
fn failed_job_delivers_reason() {
    let rig = Rig::new("jobfail");
    let (source, _) = ToneSource::new();
    let pipeline = Arc::new(VoicePipeline::new(
        Some(audio::shared(source)),
        classifier(7),
        short_config(),
    ));
    let mut queue = EventQueue::new();
    let job = start_voice_job(pipeline, rig.sender.clone(), queue.sender()).expect("start");
    assert!(matches!(job.wait(), Err(VoicePipelineError::UnexpectedLabel(7))));

    let reasons = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&reasons);
    queue.subscribe_voice(move |update| {
        if let VoiceUpdate::Failed { reason } = update {
            sink.borrow_mut().push(reason.clone());
        }
    });
    queue.drain();
    assert_eq!(
        *reasons.borrow(),
        vec!["classifier returned unexpected label 7".to_string()]
    );
    assert!(rig.recorder.raw().is_empty());
}

#[test]
fn model_file_round_trip_through_loader() {
    let path = env::temp_dir().join(format!("groundlink_voice_model_{}.json", std::process::id()));
    fs::write(
        &path,
        r#"{"weights":[0.5,0.0,0.0,0.0,0.0,0.0,0.0,0.0,0.0,0.0,0.0,0.0,0.0],"bias":-1.0}"#,
    )
    .expect("write model");
    let classifier = load_classifier(&path).expect("load");
    assert_eq!(classifier.feature_len(), 13);
    let _ = fs::remove_file(&path);

    let missing = load_classifier(&path);
    assert!(matches!(missing, Err(VoicePipelineError::ModelLoad { .. })));
}

#[test]
fn updates_serialize_with_voice_tag() {
    let json = serde_json::to_string(&VoiceUpdate::Stage {
        stage: VoiceStage::Classifying,
    })
    .expect("serialize");
    assert_eq!(json, r#"{"voice":"stage","stage":"classifying"}"#);
}

#[test]
fn idle_is_the_resting_stage_and_never_reported() {
    assert_eq!(VoiceStage::default(), VoiceStage::Idle);
    let rig = Rig::new("idle");
    for label in [1, 5] {
        let (source, _) = ToneSource::new();
        let pipeline =
            VoicePipeline::new(Some(audio::shared(source)), classifier(label), short_config());
        let (_, stages) = run_collecting(&pipeline, &rig.sender);
        assert!(!stages.is_empty());
        assert!(!stages.contains(&VoiceStage::Idle));
    }
}
