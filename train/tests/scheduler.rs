use approx::assert_abs_diff_eq;
use train::{
    common::Result,
    train::{DecayPolicy, LrScheduler, LrSchedulerInit, Phase, ScheduleState},
};

const STEPS_PER_EPOCH: usize = 100;

fn init(test_epoch_steps: Option<usize>) -> LrSchedulerInit {
    LrSchedulerInit {
        base_lr: 1e-3,
        min_lr: 1e-6,
        warmup_steps: 2 * STEPS_PER_EPOCH,
        steps_per_epoch: STEPS_PER_EPOCH,
        decay: DecayPolicy::Plateau { patience: 3 },
        test_epoch_steps,
    }
}

fn advance(scheduler: &mut LrScheduler, steps: usize) {
    (0..steps).for_each(|step| scheduler.record_train_step(1.0 / (step + 1) as f64));
}

fn persisted(scheduler: &LrScheduler) -> Result<ScheduleState> {
    let text = serde_json::to_string(&scheduler.state())?;
    Ok(serde_json::from_str(&text)?)
}

#[test]
fn resume_inside_warmup_continues_ramp() -> Result<()> {
    let mut scheduler = init(None).build(None)?;
    let initial_lr = scheduler.learning_rate();
    advance(&mut scheduler, 150);
    let expected_lr = scheduler.learning_rate();

    let state = persisted(&scheduler)?;
    assert_eq!(state, scheduler.state());

    let mut resumed = init(None).build(Some(state))?;
    assert_eq!(resumed.steps(), 150);
    assert_eq!(resumed.phase(), Phase::Warmup);
    assert_abs_diff_eq!(resumed.learning_rate(), expected_lr);
    assert!(resumed.learning_rate() > initial_lr);

    advance(&mut resumed, 50);
    assert_eq!(resumed.phase(), Phase::Steady);
    assert_abs_diff_eq!(resumed.learning_rate(), 1e-3);
    Ok(())
}

#[test]
fn resume_after_warmup_skips_ramp() -> Result<()> {
    let mut scheduler = init(None).build(None)?;
    advance(&mut scheduler, 250);
    assert_eq!(scheduler.phase(), Phase::Steady);

    let resumed = init(None).build(Some(persisted(&scheduler)?))?;
    assert_eq!(resumed.steps(), 250);
    assert_eq!(resumed.phase(), Phase::Steady);
    assert_abs_diff_eq!(resumed.learning_rate(), scheduler.learning_rate());

    // a state persisted before the phase decision is decided on load
    let mut state = resumed.state();
    state.phase = Phase::Warmup;
    let decided = init(None).build(Some(state))?;
    assert_eq!(decided.phase(), Phase::Steady);
    assert_abs_diff_eq!(decided.learning_rate(), 1e-3);
    Ok(())
}

#[test]
fn test_plateau_shrinks_exactly_once() -> Result<()> {
    // test patience: 3 epochs of 5 test steps
    let mut scheduler = init(Some(5)).build(None)?;
    advance(&mut scheduler, 200);
    assert_eq!(scheduler.phase(), Phase::Steady);

    scheduler.record_test_step(1.0);
    (0..14).for_each(|_| scheduler.record_test_step(1.0));
    assert_abs_diff_eq!(scheduler.learning_rate(), 1e-3);
    assert_eq!(scheduler.state().test_plateau.steps_without_improvement, 14);

    scheduler.record_test_step(1.0);
    assert_abs_diff_eq!(scheduler.learning_rate(), 1e-4, epsilon = 1e-15);
    assert_eq!(scheduler.state().test_plateau.steps_without_improvement, 0);

    (0..14).for_each(|_| scheduler.record_test_step(1.0));
    assert_abs_diff_eq!(scheduler.learning_rate(), 1e-4, epsilon = 1e-15);
    Ok(())
}

#[test]
fn cosine_resumes_on_curve() -> Result<()> {
    let init = LrSchedulerInit {
        base_lr: 1e-2,
        min_lr: 1e-4,
        warmup_steps: 10,
        steps_per_epoch: 10,
        decay: DecayPolicy::Cosine { epochs: 5 },
        test_epoch_steps: None,
    };
    let mut scheduler = init.clone().build(None)?;
    advance(&mut scheduler, 25);
    assert_eq!(scheduler.phase(), Phase::Cosine);

    let mut resumed = init.build(Some(persisted(&scheduler)?))?;
    assert_abs_diff_eq!(resumed.learning_rate(), scheduler.learning_rate());

    let mut steps = 0;
    while !resumed.is_finished() {
        resumed.record_train_step(1.0);
        steps += 1;
    }
    assert_eq!(resumed.steps(), 50);
    assert_eq!(steps, 25);
    assert_abs_diff_eq!(resumed.learning_rate(), 1e-4);
    Ok(())
}

#[test]
fn persisted_phase_must_match_decay() -> Result<()> {
    let mut scheduler = init(None).build(None)?;
    advance(&mut scheduler, 200);
    let state = scheduler.state();

    let result = LrSchedulerInit {
        decay: DecayPolicy::Cosine { epochs: 10 },
        ..init(None)
    }
    .build(Some(state));
    assert!(result.is_err());
    Ok(())
}
