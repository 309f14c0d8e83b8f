use train::{
    common::Result,
    train::{DecayPolicy, LrSchedulerInit},
    utils::{load_json, save_json, ArtifactPaths, BestMetrics, TrainerState},
};

#[test]
fn either_metric_improving_saves_a_checkpoint() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let paths = ArtifactPaths::new(dir.path(), "net");
    save_json(
        &paths.best_metrics(),
        &BestMetrics {
            map: 0.50,
            weighted_f1: 0.60,
        },
    )?;

    let mut best: BestMetrics = load_json(&paths.best_metrics())?.unwrap();
    let (map, weighted_f1) = (0.55, 0.55);
    assert!(best.is_improved_by(map, weighted_f1));
    best.observe(map, weighted_f1);
    save_json(&paths.best_metrics(), &best)?;

    let reloaded: BestMetrics = load_json(&paths.best_metrics())?.unwrap();
    assert_eq!(reloaded.map, 0.55);
    assert_eq!(reloaded.weighted_f1, 0.60);
    assert_eq!(
        std::fs::read_to_string(paths.best_metrics())?
            .split_whitespace()
            .collect::<String>(),
        "[0.55,0.6]"
    );
    Ok(())
}

#[test]
fn trainer_state_round_trips() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let paths = ArtifactPaths::new(dir.path(), "net");

    let mut scheduler = LrSchedulerInit {
        base_lr: 0.1,
        min_lr: 0.001,
        warmup_steps: 3,
        steps_per_epoch: 3,
        decay: DecayPolicy::Plateau { patience: 2 },
        test_epoch_steps: Some(4),
    }
    .build(None)?;
    [1.0, 0.9, 0.8, 0.7, 0.75, 0.9]
        .iter()
        .for_each(|&loss| scheduler.record_train_step(loss));
    scheduler.record_test_step(0.4);

    let state = TrainerState {
        schedule: scheduler.state(),
        test_cycle: 9,
    };
    save_json(&paths.sync_state(), &state)?;
    assert_eq!(load_json(&paths.sync_state())?, Some(state));
    Ok(())
}

#[test]
fn shrunk_learning_rates_persist_bit_exact() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let paths = ArtifactPaths::new(dir.path(), "net");

    let mut scheduler = LrSchedulerInit {
        base_lr: 0.3,
        min_lr: 1e-12,
        warmup_steps: 1,
        steps_per_epoch: 1,
        decay: DecayPolicy::Plateau { patience: 1 },
        test_epoch_steps: None,
    }
    .build(None)?;

    let mut num_shrinks = 0;
    while !scheduler.is_finished() {
        let lr = scheduler.learning_rate();
        scheduler.record_train_step(1.0 / 3.0);
        if scheduler.learning_rate() < lr {
            num_shrinks += 1;
        }

        let state = TrainerState {
            schedule: scheduler.state(),
            test_cycle: 0,
        };
        save_json(&paths.sync_state(), &state)?;
        let loaded: TrainerState = load_json(&paths.sync_state())?.unwrap();
        assert_eq!(
            loaded.schedule.learning_rate.to_bits(),
            state.schedule.learning_rate.to_bits()
        );
        assert_eq!(loaded, state);
    }
    assert!(num_shrinks >= 10);
    Ok(())
}
