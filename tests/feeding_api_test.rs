// ==========================================
// 投喂 API 前置条件测试
// ==========================================
// 职责: 验证启动投喂的前置条件校验与手动设备控制
// 红线: 前置条件失败时不创建会话、不下发任何设备命令
// ==========================================


#[cfg(test)]
mod feeding_api_test {
    use std::time::Duration;

    use cage_feeding::api::{ApiError, ManualDeviceCommand};
    use cage_feeding::domain::{CageFeedingMode, SessionStatus};

    use crate::test_helpers::*;

    fn assert_nothing_started(env: &TestEnv) {
        assert!(env.api.list_sessions_by_line(LINE_ID).unwrap().is_empty());
        let snapshot = env.device.snapshot(LINE_ID).unwrap();
        assert!(snapshot.commands.is_empty());
        assert_eq!(snapshot.stop_count, 0);
    }

    // ==========================================
    // 前置条件
    // ==========================================

    #[tokio::test]
    async fn test_insufficient_stock_is_rejected() {
        // 计划 2 × 3 × 2kg = 12kg，库存 10kg
        let env = setup_env(3, Duration::from_millis(5), 10.0);

        let err = env.api.start_feeding(two_cage_plan()).await.unwrap_err();
        match err {
            ApiError::InsufficientStock(shortage) => {
                assert_eq!(shortage.silo_id, SILO_ID);
                assert!((shortage.required_kg - 12.0).abs() < 1e-9);
                assert!((shortage.shortage_kg - 2.0).abs() < 1e-9);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_nothing_started(&env);
    }

    #[tokio::test]
    async fn test_pause_and_fasting_do_not_need_stock() {
        let env = setup_env(3, Duration::from_millis(5), 2.0);

        let request = start_request(vec![
            cage_plan("C1", 2.0, 1, CageFeedingMode::Normal),
            cage_plan("C2", 5.0, 1, CageFeedingMode::Fasting),
        ]);
        let started = env.api.start_feeding(request).await.unwrap();
        started.task.await.unwrap().unwrap();

        let session = env.api.get_session(&started.session_id).unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
    }

    #[tokio::test]
    async fn test_line_with_active_session_is_rejected() {
        let env = setup_env(50, Duration::from_millis(10), 100.0);

        let first = env.api.start_feeding(two_cage_plan()).await.unwrap();
        let err = env.api.start_feeding(two_cage_plan()).await.unwrap_err();
        match err {
            ApiError::ActiveSessionExists {
                line_id,
                session_id,
            } => {
                assert_eq!(line_id, LINE_ID);
                assert_eq!(session_id, first.session_id);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(env.api.list_sessions_by_line(LINE_ID).unwrap().len(), 1);

        env.api.cancel_feeding(&first.session_id, "op1").await.unwrap();
        first.task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_cage_not_on_line_is_rejected() {
        let env = setup_fast_env();

        let request = start_request(vec![
            cage_plan("C1", 1.0, 1, CageFeedingMode::Normal),
            cage_plan("C9", 1.0, 1, CageFeedingMode::Normal),
        ]);
        let err = env.api.start_feeding(request).await.unwrap_err();
        assert!(matches!(err, ApiError::CageNotOnLine { ref cage_id, .. } if cage_id == "C9"));
        assert_nothing_started(&env);
    }

    #[tokio::test]
    async fn test_rate_above_doser_capacity_is_rejected() {
        let env = setup_fast_env();

        let mut cage = cage_plan("C1", 1.0, 1, CageFeedingMode::Normal);
        cage.rate_kg_per_min = MAX_RATE + 5.0;
        let err = env.api.start_feeding(start_request(vec![cage])).await.unwrap_err();

        assert!(matches!(err, ApiError::RateExceedsCapacity { .. }));
        assert_nothing_started(&env);
    }

    #[tokio::test]
    async fn test_unknown_line_and_duplicate_cage() {
        let env = setup_fast_env();

        let mut request = two_cage_plan();
        request.line_id = "L404".to_string();
        let err = env.api.start_feeding(request).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        let request = start_request(vec![
            cage_plan("C1", 1.0, 1, CageFeedingMode::Normal),
            cage_plan("C1", 1.0, 1, CageFeedingMode::Normal),
        ]);
        let err = env.api.start_feeding(request).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));

        let err = env.api.start_feeding(start_request(vec![])).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));

        assert_nothing_started(&env);
    }

    // ==========================================
    // 运行中修改 / 会话状态
    // ==========================================

    #[tokio::test]
    async fn test_rate_update_is_validated() {
        let env = setup_env(50, Duration::from_millis(10), 100.0);

        let started = env.api.start_feeding(two_cage_plan()).await.unwrap();
        let feeding = env.api.list_cage_feedings(&started.session_id).unwrap().remove(0);

        let err = env
            .api
            .update_feeding_rate(&feeding.cage_feeding_id, MAX_RATE + 1.0)
            .unwrap_err();
        assert!(matches!(err, ApiError::RateExceedsCapacity { .. }));

        let err = env.api.update_feeding_rate("missing", 10.0).unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        env.api.cancel_feeding(&started.session_id, "op1").await.unwrap();
        started.task.await.unwrap().unwrap();

        // 终态会话不允许改速率
        let err = env
            .api
            .update_feeding_rate(&feeding.cage_feeding_id, 10.0)
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidStateTransition { .. }));
    }

    #[tokio::test]
    async fn test_pause_requires_active_session() {
        let env = setup_fast_env();

        let started = env.api.start_feeding(two_cage_plan()).await.unwrap();
        started.task.await.unwrap().unwrap();

        let err = env
            .api
            .pause_feeding(&started.session_id, "op1")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidStateTransition { .. }));

        let err = env.api.stop_feeding("missing", "op1").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    // ==========================================
    // 手动设备控制
    // ==========================================

    #[tokio::test]
    async fn test_manual_control_when_line_idle() {
        let env = setup_fast_env();

        env.api
            .manual_control(LINE_ID, ManualDeviceCommand::Selector { slot: 2 })
            .await
            .unwrap();
        env.api
            .manual_control(
                LINE_ID,
                ManualDeviceCommand::Doser {
                    doser_id: DOSER_ID.to_string(),
                    rate_kg_per_min: 10.0,
                    on: true,
                },
            )
            .await
            .unwrap();

        let err = env
            .api
            .manual_control(
                LINE_ID,
                ManualDeviceCommand::Blower {
                    power_pct: 150.0,
                    on: true,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));

        let manual = env.device.snapshot(LINE_ID).unwrap().manual_commands;
        assert_eq!(manual.len(), 2);
        assert!(manual[0].contains("slot=2"));
    }

    #[tokio::test]
    async fn test_manual_control_rejected_while_feeding() {
        let env = setup_env(50, Duration::from_millis(10), 100.0);

        let started = env.api.start_feeding(two_cage_plan()).await.unwrap();
        let err = env
            .api
            .manual_control(LINE_ID, ManualDeviceCommand::Selector { slot: 1 })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::ActiveSessionExists { .. }));

        env.api.stop_feeding(&started.session_id, "op1").await.unwrap();
        started.task.await.unwrap().unwrap();
        assert!(env.device.snapshot(LINE_ID).unwrap().manual_commands.is_empty());
    }
}
