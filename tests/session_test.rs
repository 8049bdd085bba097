mod support;

use exam_session::engine::{spawn_countdown, CountdownEnd};
use exam_session::infrastructure::MemoryShadowStore;
use exam_session::models::{QuestionStatus, ScriptStep};
use exam_session::orchestrator::{run_session, App};
use exam_session::{Config, ExamScript, SubmitOutcome};
use std::sync::Arc;
use std::time::Duration;
use support::{controller, mounted, Call, FakeBackend, ATTEMPT_ID, EXAM_ID};
use tokio_test::assert_ok;

fn script(steps: Vec<ScriptStep>) -> ExamScript {
    ExamScript {
        name: "模拟考试".to_string(),
        exam_id: EXAM_ID,
        steps,
        file_path: None,
    }
}

fn answer(question_id: Option<i64>, answer: &str) -> ScriptStep {
    ScriptStep::Answer {
        question_id,
        answer: answer.to_string(),
    }
}

// ========== 倒计时 ==========

#[tokio::test(start_paused = true)]
async fn countdown_expiry_submits_pending_answers() {
    let backend = Arc::new(FakeBackend::new(&[1, 2, 3]).with_time_left(3000));
    let shadow = Arc::new(MemoryShadowStore::new());
    let controller = controller(&backend, &shadow);
    assert_ok!(controller.mount().await);

    controller.save_answer(1, "A");
    let handle = spawn_countdown(controller.clone(), Duration::from_millis(1000));
    let end = assert_ok!(handle.await.expect("倒计时任务异常"));

    assert_eq!(end, CountdownEnd::Expired(SubmitOutcome::Submitted));
    assert_eq!(controller.time_left_ms(), Some(0));
    assert!(controller.is_submitted());
    assert_eq!(backend.submit_count(), 1);
    assert_eq!(
        backend.outbound().last(),
        Some(&Call::Submit(ATTEMPT_ID.to_string()))
    );
}

#[tokio::test(start_paused = true)]
async fn countdown_stops_after_manual_submit() {
    let backend = Arc::new(FakeBackend::new(&[1, 2]).with_time_left(60_000));
    let shadow = Arc::new(MemoryShadowStore::new());
    let controller = controller(&backend, &shadow);
    assert_ok!(controller.mount().await);

    let handle = spawn_countdown(controller.clone(), Duration::from_millis(1000));
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_ok!(controller.submit().await);

    let end = assert_ok!(handle.await.expect("倒计时任务异常"));
    assert_eq!(end, CountdownEnd::Stopped);
    assert_eq!(backend.submit_count(), 1);
}

#[tokio::test]
async fn untimed_exam_has_no_countdown() {
    let (controller, _backend, _shadow) = mounted(&[1]).await;
    let end = assert_ok!(spawn_countdown(controller, Duration::from_millis(10))
        .await
        .expect("倒计时任务异常"));
    assert_eq!(end, CountdownEnd::Untimed);
}

// ========== 脚本会话 ==========

#[tokio::test(start_paused = true)]
async fn script_runs_steps_and_submits_at_the_end() {
    let backend = Arc::new(FakeBackend::new(&[1, 2, 3]));
    let shadow = Arc::new(MemoryShadowStore::new());
    let steps = vec![
        answer(None, "B"),
        ScriptStep::Next,
        ScriptStep::Mark { question_id: None },
        ScriptStep::Wait { ms: 800 },
        answer(Some(3), "D"),
        ScriptStep::Clear { question_id: Some(3) },
    ];

    let report = assert_ok!(
        run_session(backend.clone(), shadow, script(steps), 1, &Config::default()).await
    );

    assert!(report.submitted);
    assert_eq!(report.steps_run, 6);
    assert_eq!(report.counts.get(QuestionStatus::Answered), 1);
    assert_eq!(report.counts.get(QuestionStatus::MarkedForReview), 1);
    assert_eq!(report.counts.get(QuestionStatus::NotAnswered), 1);
    assert_eq!(report.counts.total(), 3);

    // 等待期间同步一批，交卷前再同步剩余
    let saves = backend.saves();
    assert_eq!(saves.len(), 2);
    assert_eq!(saves[1].items.len(), 1);
    assert_eq!(backend.outbound().last(), Some(&Call::Submit(ATTEMPT_ID.to_string())));
}

#[tokio::test]
async fn explicit_submit_step_skips_remaining_steps() {
    let backend = Arc::new(FakeBackend::new(&[1, 2]));
    let shadow = Arc::new(MemoryShadowStore::new());
    let steps = vec![answer(None, "A"), ScriptStep::Submit, answer(Some(2), "B")];

    let report = assert_ok!(
        run_session(backend.clone(), shadow, script(steps), 1, &Config::default()).await
    );

    assert!(report.submitted);
    assert_eq!(report.steps_run, 2);
    assert_eq!(backend.submit_count(), 1);
}

#[tokio::test]
async fn batch_run_tallies_sessions() {
    let config = Config {
        max_concurrent_sessions: 2,
        ..Config::default()
    };
    let backend = Arc::new(FakeBackend::new(&[1, 2]));
    let failing = Arc::new(FakeBackend::new(&[1, 2]).failing_meta());
    let shadow = Arc::new(MemoryShadowStore::new());

    let ok_app = App::with_parts(config.clone(), backend.clone(), shadow.clone());
    let stats = ok_app
        .run_all(vec![script(vec![answer(None, "A")]), script(vec![ScriptStep::Next])])
        .await;
    assert_eq!((stats.success, stats.failed, stats.total), (2, 0, 2));
    assert_eq!(backend.submit_count(), 2);

    let failing_app = App::with_parts(config, failing, shadow);
    let stats = failing_app.run_all(vec![script(Vec::new())]).await;
    assert_eq!((stats.success, stats.failed, stats.total), (0, 1, 1));
}
