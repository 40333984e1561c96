// ==========================================
// 投喂编排集成测试
// ==========================================
// 职责: 验证完整投喂流程 (计划 → 模拟器 → 持久化)
// 覆盖: 正常完成、硬件故障中断、停机失败不重试、FASTING/PAUSE、
//       外部停止/取消 (轮询中 / PAUSE 等待中 / 最后一次轮询)、
//       运行中改速率、暂停恢复、当前网箱追踪、超量下料的库存核算
// ==========================================


#[cfg(test)]
mod feeding_orchestrator_test {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use cage_feeding::device::DevicePort;
    use cage_feeding::domain::{CageFeedingMode, CageFeedingStatus, FeedingEventKind, SessionStatus};
    use cage_feeding::engine::{EngineError, RunOutcome};

    use crate::test_helpers::*;

    fn count_events(env: &TestEnv, session_id: &str, event_type: &str) -> i64 {
        env.repos
            .event_repo
            .count_by_type(session_id, event_type)
            .unwrap()
    }

    fn interrupted_event(env: &TestEnv, session_id: &str) -> (String, Option<String>, i32, i32) {
        env.api
            .list_session_events(session_id)
            .unwrap()
            .into_iter()
            .find_map(|e| match e.kind {
                FeedingEventKind::SessionInterrupted {
                    reason,
                    cage_id,
                    cage_pending_visits,
                    pending_visits,
                    ..
                } => Some((reason, cage_id, cage_pending_visits, pending_visits)),
                _ => None,
            })
            .unwrap()
    }

    async fn wait_for_commands(env: &TestEnv, count: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while env.device.snapshot(LINE_ID).unwrap().commands.len() < count {
            assert!(Instant::now() < deadline, "设备未收到第 {} 条访问命令", count);
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    fn failing_stop_env(polls_per_visit: u32, stop_calls: &Arc<AtomicU32>) -> TestEnv {
        let stop_calls = stop_calls.clone();
        setup_env_with(polls_per_visit, Duration::from_millis(5), 100.0, move |sim, _| {
            Arc::new(FailingStopDevice::new(sim, stop_calls)) as Arc<dyn DevicePort>
        })
    }

    fn silo_stock(env: &TestEnv) -> f64 {
        env.repos
            .silo_repo
            .find_by_id(SILO_ID)
            .unwrap()
            .unwrap()
            .stock_kg
    }

    // ==========================================
    // 正常完成
    // ==========================================

    #[tokio::test]
    async fn test_two_cages_three_visits_complete() {
        let env = setup_fast_env();

        let started = env.api.start_feeding(two_cage_plan()).await.unwrap();
        let outcome = started.task.await.unwrap().unwrap();

        match outcome {
            RunOutcome::Completed { total_dispensed_kg } => {
                assert!((total_dispensed_kg - 12.0).abs() < 1e-9);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        let session = env.api.get_session(&started.session_id).unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert!(session.ended_at.is_some());
        assert!((session.total_dispensed_kg - 12.0).abs() < 1e-9);

        let sid = &started.session_id;
        assert_eq!(count_events(&env, sid, "session_started"), 1);
        assert_eq!(count_events(&env, sid, "visit_started"), 6);
        assert_eq!(count_events(&env, sid, "visit_completed"), 6);
        assert_eq!(count_events(&env, sid, "session_completed"), 1);
        assert_eq!(env.api.list_session_events(sid).unwrap().len(), 14);

        let feedings = env.api.list_cage_feedings(sid).unwrap();
        for feeding in &feedings {
            assert_eq!(feeding.completed_visits, 3);
            assert_eq!(feeding.status, CageFeedingStatus::Completed);
            assert!((feeding.dispensed_kg - 6.0).abs() < 1e-9);
        }

        // 访问顺序: 按轮次交替
        let snapshot = env.device.snapshot(LINE_ID).unwrap();
        let slots: Vec<i32> = snapshot.commands.iter().map(|c| c.slot).collect();
        assert_eq!(slots, vec![1, 2, 1, 2, 1, 2]);
        assert_eq!(snapshot.stop_count, 1);

        assert!((silo_stock(&env) - 88.0).abs() < 1e-9);
        assert!(env.api.get_feeding_progress(LINE_ID).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cages_are_visited_in_slot_order() {
        let env = setup_fast_env();

        // 请求顺序与槽位顺序不同
        let request = start_request(vec![
            cage_plan("C3", 1.0, 1, CageFeedingMode::Normal),
            cage_plan("C1", 1.0, 1, CageFeedingMode::Normal),
        ]);
        let started = env.api.start_feeding(request).await.unwrap();
        started.task.await.unwrap().unwrap();

        let slots: Vec<i32> = env
            .device
            .snapshot(LINE_ID)
            .unwrap()
            .commands
            .iter()
            .map(|c| c.slot)
            .collect();
        assert_eq!(slots, vec![1, 3]);

        let feedings = env.api.list_cage_feedings(&started.session_id).unwrap();
        assert_eq!(feedings[0].cage_id, "C1");
        assert_eq!(feedings[0].execution_order, 1);
        assert_eq!(feedings[1].cage_id, "C3");
    }

    #[tokio::test]
    async fn test_over_delivery_is_reflected_in_stock() {
        let env = setup_fast_env();
        env.device.set_dispense_factor(LINE_ID, 1.1);

        let started = env.api.start_feeding(two_cage_plan()).await.unwrap();
        started.task.await.unwrap().unwrap();

        // 按设备实报量扣减 (6 × 2.2kg)
        assert!((silo_stock(&env) - (100.0 - 13.2)).abs() < 1e-6);
        let session = env.api.get_session(&started.session_id).unwrap();
        assert!((session.total_dispensed_kg - 13.2).abs() < 1e-6);
    }

    // ==========================================
    // 硬件故障
    // ==========================================

    #[tokio::test]
    async fn test_hardware_error_interrupts_session() {
        let env = setup_fast_env();
        env.device.fail_at(LINE_ID, 4, 2, 42);

        let started = env.api.start_feeding(two_cage_plan()).await.unwrap();
        let outcome = started.task.await.unwrap().unwrap();
        assert_eq!(
            outcome,
            RunOutcome::Interrupted {
                error_code: Some(42)
            }
        );

        let sid = &started.session_id;
        let session = env.api.get_session(sid).unwrap();
        assert_eq!(session.status, SessionStatus::Interrupted);

        let feedings = env.api.list_cage_feedings(sid).unwrap();
        let completed: i32 = feedings.iter().map(|f| f.completed_visits).sum();
        assert_eq!(completed, 3);

        let snapshot = env.device.snapshot(LINE_ID).unwrap();
        assert_eq!(snapshot.commands.len(), 4);
        assert_eq!(snapshot.stop_count, 1);

        assert_eq!(count_events(&env, sid, "session_interrupted"), 1);
        assert_eq!(count_events(&env, sid, "session_completed"), 0);
        assert_eq!(count_events(&env, sid, "visit_completed"), 3);

        let interrupted = env
            .api
            .list_session_events(sid)
            .unwrap()
            .into_iter()
            .find_map(|e| match e.kind {
                FeedingEventKind::SessionInterrupted {
                    reason,
                    error_code,
                    cage_id,
                    cage_pending_visits,
                    pending_visits,
                } => Some((reason, error_code, cage_id, cage_pending_visits, pending_visits)),
                _ => None,
            })
            .unwrap();
        assert_eq!(interrupted.0, "hardware_error");
        assert_eq!(interrupted.1, Some(42));
        assert_eq!(interrupted.2.as_deref(), Some("C2"));
        assert_eq!(interrupted.3, 2);
        assert_eq!(interrupted.4, 3);

        // 三次完成访问的下料量已扣减
        assert!((silo_stock(&env) - 94.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_failed_stop_after_hardware_error_is_not_retried() {
        let stop_calls = Arc::new(AtomicU32::new(0));
        let env = failing_stop_env(3, &stop_calls);
        env.device.fail_at(LINE_ID, 1, 2, 42);

        let started = env.api.start_feeding(two_cage_plan()).await.unwrap();
        let result = started.task.await.unwrap();

        assert!(matches!(result, Err(EngineError::StopFailed { .. })), "{:?}", result);
        assert_eq!(stop_calls.load(Ordering::SeqCst), 1);

        let sid = &started.session_id;
        assert_eq!(env.api.get_session(sid).unwrap().status, SessionStatus::Interrupted);
        assert_eq!(count_events(&env, sid, "session_interrupted"), 1);
        assert_eq!(env.device.snapshot(LINE_ID).unwrap().commands.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_stop_after_completion_is_not_retried() {
        let stop_calls = Arc::new(AtomicU32::new(0));
        let env = failing_stop_env(3, &stop_calls);

        let request = start_request(vec![cage_plan("C1", 1.0, 1, CageFeedingMode::Normal)]);
        let started = env.api.start_feeding(request).await.unwrap();
        let result = started.task.await.unwrap();

        assert!(matches!(result, Err(EngineError::StopFailed { .. })), "{:?}", result);
        assert_eq!(stop_calls.load(Ordering::SeqCst), 1);

        let sid = &started.session_id;
        assert_eq!(env.api.get_session(sid).unwrap().status, SessionStatus::Completed);
        assert_eq!(count_events(&env, sid, "session_completed"), 1);
    }

    // ==========================================
    // FASTING / PAUSE
    // ==========================================

    #[tokio::test]
    async fn test_fasting_cage_is_never_visited() {
        let env = setup_fast_env();

        let request = start_request(vec![
            cage_plan("C1", 2.0, 2, CageFeedingMode::Normal),
            cage_plan("C2", 2.0, 0, CageFeedingMode::Fasting),
        ]);
        let started = env.api.start_feeding(request).await.unwrap();
        let outcome = started.task.await.unwrap().unwrap();
        assert!(matches!(outcome, RunOutcome::Completed { .. }));

        let feedings = env.api.list_cage_feedings(&started.session_id).unwrap();
        let normal = feedings.iter().find(|f| f.cage_id == "C1").unwrap();
        let fasting = feedings.iter().find(|f| f.cage_id == "C2").unwrap();

        assert_eq!(normal.completed_visits, 2);
        assert_eq!(normal.status, CageFeedingStatus::Completed);
        assert_eq!(fasting.programmed_visits, 0);
        assert_eq!(fasting.completed_visits, 0);
        assert_eq!(fasting.dispensed_kg, 0.0);

        let snapshot = env.device.snapshot(LINE_ID).unwrap();
        assert!(snapshot.commands.iter().all(|c| c.slot == 1));
        assert_eq!(snapshot.commands.len(), 2);
    }

    #[tokio::test]
    async fn test_pause_cage_consumes_time_without_dispensing() {
        let env = setup_fast_env();

        // 0.1kg @ 12kg/min = 0.5s 等效下料时间，布局时序全为 0
        let request = start_request(vec![
            cage_plan("C1", 1.0, 2, CageFeedingMode::Normal),
            cage_plan("C2", 0.1, 2, CageFeedingMode::Pause),
        ]);
        let begin = Instant::now();
        let started = env.api.start_feeding(request).await.unwrap();
        started.task.await.unwrap().unwrap();
        let elapsed = begin.elapsed();

        assert!(elapsed >= Duration::from_millis(1_000), "elapsed={:?}", elapsed);

        let feedings = env.api.list_cage_feedings(&started.session_id).unwrap();
        let pause = feedings.iter().find(|f| f.cage_id == "C2").unwrap();
        assert_eq!(pause.dispensed_kg, 0.0);
        assert_eq!(pause.completed_visits, 0);

        let snapshot = env.device.snapshot(LINE_ID).unwrap();
        assert!(snapshot.commands.iter().all(|c| c.slot == 1));

        // PAUSE 网箱不计入计划总量
        let session = env.api.get_session(&started.session_id).unwrap();
        assert!((session.total_programmed_kg - 2.0).abs() < 1e-9);
    }

    // ==========================================
    // 外部停止 / 取消
    // ==========================================

    #[tokio::test]
    async fn test_cancel_between_polls_aborts_run() {
        // 单次访问约 50 × 10ms
        let env = setup_env(50, Duration::from_millis(10), 100.0);

        let started = env.api.start_feeding(two_cage_plan()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let status = env.api.cancel_feeding(&started.session_id, "op2").await.unwrap();
        assert_eq!(status, SessionStatus::Cancelled);

        let outcome = tokio::time::timeout(Duration::from_secs(5), started.task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(
            outcome,
            RunOutcome::Aborted {
                observed_status: SessionStatus::Cancelled
            }
        );

        let sid = &started.session_id;
        let snapshot = env.device.snapshot(LINE_ID).unwrap();
        assert_eq!(snapshot.commands.len(), 1);
        // 唯一一次停机来自取消请求
        assert_eq!(snapshot.stop_count, 1);

        assert_eq!(count_events(&env, sid, "session_cancelled"), 1);
        assert_eq!(count_events(&env, sid, "visit_completed"), 0);
        assert_eq!(count_events(&env, sid, "session_completed"), 0);
        assert_eq!(env.api.get_session(sid).unwrap().status, SessionStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_operator_stop_marks_interrupted() {
        let env = setup_env(50, Duration::from_millis(10), 100.0);

        let started = env.api.start_feeding(two_cage_plan()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let status = env.api.stop_feeding(&started.session_id, "op2").await.unwrap();
        assert_eq!(status, SessionStatus::Interrupted);

        let outcome = started.task.await.unwrap().unwrap();
        assert_eq!(
            outcome,
            RunOutcome::Aborted {
                observed_status: SessionStatus::Interrupted
            }
        );

        let reason = env
            .api
            .list_session_events(&started.session_id)
            .unwrap()
            .into_iter()
            .find_map(|e| match e.kind {
                FeedingEventKind::SessionInterrupted {
                    reason,
                    cage_id,
                    pending_visits,
                    ..
                } => Some((reason, cage_id, pending_visits)),
                _ => None,
            })
            .unwrap();
        assert_eq!(reason.0, "operator_stop");
        assert_eq!(reason.1.as_deref(), Some("C1"));
        assert_eq!(reason.2, 6);
    }

    #[tokio::test]
    async fn test_stop_and_cancel_are_noops_on_terminal_session() {
        let env = setup_fast_env();

        let started = env.api.start_feeding(two_cage_plan()).await.unwrap();
        started.task.await.unwrap().unwrap();
        let sid = &started.session_id;
        let events_before = env.api.list_session_events(sid).unwrap().len();
        let stops_before = env.device.snapshot(LINE_ID).unwrap().stop_count;

        assert_eq!(
            env.api.stop_feeding(sid, "op2").await.unwrap(),
            SessionStatus::Completed
        );
        assert_eq!(
            env.api.cancel_feeding(sid, "op2").await.unwrap(),
            SessionStatus::Completed
        );

        assert_eq!(env.api.list_session_events(sid).unwrap().len(), events_before);
        assert_eq!(env.device.snapshot(LINE_ID).unwrap().stop_count, stops_before);
        assert_eq!(count_events(&env, sid, "session_completed"), 1);
    }

    // ==========================================
    // 运行中操作
    // ==========================================

    #[tokio::test]
    async fn test_rate_change_applies_to_next_visit() {
        let env = setup_env(20, Duration::from_millis(10), 100.0);

        let request = start_request(vec![cage_plan("C1", 1.0, 2, CageFeedingMode::Normal)]);
        let started = env.api.start_feeding(request).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let feeding = env.api.list_cage_feedings(&started.session_id).unwrap().remove(0);
        let updated = env
            .api
            .update_feeding_rate(&feeding.cage_feeding_id, 15.0)
            .unwrap();
        assert_eq!(updated.rate_kg_per_min, 15.0);

        started.task.await.unwrap().unwrap();

        let commands = env.device.snapshot(LINE_ID).unwrap().commands;
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].rate_kg_per_min, 12.0);
        assert_eq!(commands[1].rate_kg_per_min, 15.0);
        assert_eq!(
            count_events(&env, &started.session_id, "feeding_rate_changed"),
            1
        );
    }

    #[tokio::test]
    async fn test_pause_and_resume_hold_the_visit() {
        let env = setup_env(20, Duration::from_millis(10), 100.0);

        let request = start_request(vec![cage_plan("C1", 1.0, 1, CageFeedingMode::Normal)]);
        let started = env.api.start_feeding(request).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        env.api.pause_feeding(&started.session_id, "op1").await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        let progress = env.api.get_feeding_progress(LINE_ID).await.unwrap().unwrap();
        assert!(progress.device_status.is_paused);
        assert_eq!(progress.session.status, SessionStatus::Active);
        assert_eq!(progress.completed_visits, 0);
        assert!(progress.completion_pct < 100.0);
        assert_eq!(
            progress.current_cage_feeding.map(|f| f.cage_id),
            Some("C1".to_string())
        );

        env.api.resume_feeding(&started.session_id, "op1").await.unwrap();
        let outcome = started.task.await.unwrap().unwrap();
        assert!(matches!(outcome, RunOutcome::Completed { .. }));

        let sid = &started.session_id;
        assert_eq!(count_events(&env, sid, "session_paused"), 1);
        assert_eq!(count_events(&env, sid, "session_resumed"), 1);
        let snapshot = env.device.snapshot(LINE_ID).unwrap();
        assert_eq!(snapshot.pause_count, 1);
        assert_eq!(snapshot.resume_count, 1);
    }

    #[tokio::test]
    async fn test_progress_reports_live_dispensing() {
        let env = setup_env(20, Duration::from_millis(10), 100.0);

        let request = start_request(vec![cage_plan("C1", 2.0, 1, CageFeedingMode::Normal)]);
        let started = env.api.start_feeding(request).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        let progress = env.api.get_feeding_progress(LINE_ID).await.unwrap().unwrap();
        assert_eq!(progress.session.session_id, started.session_id);
        assert!(progress.completion_pct >= 0.0 && progress.completion_pct <= 100.0);
        assert_eq!(progress.dispensed_kg, 0.0);

        started.task.await.unwrap().unwrap();
        assert!(env.api.get_feeding_progress(LINE_ID).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_completed_visits_never_exceed_programmed() {
        let env = setup_fast_env();

        let request = start_request(vec![
            cage_plan("C1", 1.0, 3, CageFeedingMode::Normal),
            cage_plan("C2", 1.0, 1, CageFeedingMode::Normal),
            cage_plan("C3", 1.0, 2, CageFeedingMode::Normal),
        ]);
        let started = env.api.start_feeding(request).await.unwrap();
        started.task.await.unwrap().unwrap();

        let feedings = env.api.list_cage_feedings(&started.session_id).unwrap();
        for feeding in &feedings {
            assert_eq!(feeding.completed_visits, feeding.programmed_visits);
        }
        // 第 2、3 轮跳过已完成的网箱
        let slots: Vec<i32> = env
            .device
            .snapshot(LINE_ID)
            .unwrap()
            .commands
            .iter()
            .map(|c| c.slot)
            .collect();
        assert_eq!(slots, vec![1, 2, 3, 1, 3, 1]);
    }

    #[tokio::test]
    async fn test_cancel_during_pause_wait_aborts_run() {
        let env = setup_fast_env();

        // C1 (槽位1) PAUSE 等效 0.5s，随后 C2 才会访问
        let request = start_request(vec![
            cage_plan("C1", 0.1, 1, CageFeedingMode::Pause),
            cage_plan("C2", 1.0, 1, CageFeedingMode::Normal),
        ]);
        let started = env.api.start_feeding(request).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let status = env.api.cancel_feeding(&started.session_id, "op2").await.unwrap();
        assert_eq!(status, SessionStatus::Cancelled);

        let outcome = tokio::time::timeout(Duration::from_secs(5), started.task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(
            outcome,
            RunOutcome::Aborted {
                observed_status: SessionStatus::Cancelled
            }
        );

        let sid = &started.session_id;
        let snapshot = env.device.snapshot(LINE_ID).unwrap();
        assert!(snapshot.commands.is_empty());
        assert_eq!(snapshot.stop_count, 1);
        assert_eq!(count_events(&env, sid, "visit_started"), 0);
        assert_eq!(count_events(&env, sid, "session_completed"), 0);
    }

    #[tokio::test]
    async fn test_cancel_in_final_poll_window_skips_completion() {
        // 第 2 次 (最后一次) 访问报告 COMPLETED 的同一轮询里会话被取消
        let env = setup_env_with(3, Duration::from_millis(5), 100.0, |sim, repos| {
            Arc::new(CancelOnCompletionDevice::new(sim, repos, 2)) as Arc<dyn DevicePort>
        });

        let request = start_request(vec![cage_plan("C1", 1.0, 2, CageFeedingMode::Normal)]);
        let started = env.api.start_feeding(request).await.unwrap();
        let outcome = tokio::time::timeout(Duration::from_secs(5), started.task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(
            outcome,
            RunOutcome::Aborted {
                observed_status: SessionStatus::Cancelled
            }
        );

        let sid = &started.session_id;
        assert_eq!(env.api.get_session(sid).unwrap().status, SessionStatus::Cancelled);
        assert_eq!(count_events(&env, sid, "visit_started"), 2);
        assert_eq!(count_events(&env, sid, "visit_completed"), 1);
        assert_eq!(count_events(&env, sid, "session_cancelled"), 1);
        assert_eq!(count_events(&env, sid, "session_completed"), 0);

        // 只扣减第一次访问；取消方未经 API，编排器也不再停机
        assert!((silo_stock(&env) - 99.0).abs() < 1e-9);
        assert_eq!(env.device.snapshot(LINE_ID).unwrap().stop_count, 0);
    }

    #[tokio::test]
    async fn test_huge_pause_amount_can_be_cancelled() {
        let env = setup_fast_env();

        let request = start_request(vec![cage_plan("C1", 1e300, 1, CageFeedingMode::Pause)]);
        let started = env.api.start_feeding(request).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        env.api.cancel_feeding(&started.session_id, "op2").await.unwrap();
        let outcome = tokio::time::timeout(Duration::from_secs(5), started.task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(
            outcome,
            RunOutcome::Aborted {
                observed_status: SessionStatus::Cancelled
            }
        );
    }

    // ==========================================
    // 当前网箱 / 进度查询
    // ==========================================

    #[tokio::test]
    async fn test_current_cage_follows_device_in_later_rounds() {
        // 单次访问约 10 × 20ms
        let env = setup_env(10, Duration::from_millis(20), 100.0);

        let started = env.api.start_feeding(two_cage_plan()).await.unwrap();
        // 第 4 条命令: 第 2 轮访问 C2
        wait_for_commands(&env, 4).await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        let last_slot = env.device.snapshot(LINE_ID).unwrap().commands[3].slot;
        assert_eq!(last_slot, 2);

        let progress = env.api.get_feeding_progress(LINE_ID).await.unwrap().unwrap();
        let current = progress.current_cage_feeding.unwrap();
        assert_eq!(current.cage_id, "C2");
        assert_eq!(current.completed_visits, 1);
        assert_eq!(progress.completed_visits, 3);

        let status = env.api.stop_feeding(&started.session_id, "op2").await.unwrap();
        assert_eq!(status, SessionStatus::Interrupted);
        started.task.await.unwrap().unwrap();

        let (reason, cage_id, cage_pending, pending_total) =
            interrupted_event(&env, &started.session_id);
        assert_eq!(reason, "operator_stop");
        assert_eq!(cage_id.as_deref(), Some("C2"));
        assert_eq!(cage_pending, 2);
        assert_eq!(pending_total, 3);
    }

    #[tokio::test]
    async fn test_progress_queries_do_not_advance_visit() {
        let env = setup_env(3, Duration::from_millis(20), 100.0);

        let request = start_request(vec![cage_plan("C1", 1.0, 1, CageFeedingMode::Normal)]);
        let started = env.api.start_feeding(request).await.unwrap();
        for _ in 0..10 {
            env.api.get_feeding_progress(LINE_ID).await.unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        started.task.await.unwrap().unwrap();

        // 只有编排器的 3 次轮询推进了访问
        assert_eq!(env.device.snapshot(LINE_ID).unwrap().status_polls, 3);
    }
}
