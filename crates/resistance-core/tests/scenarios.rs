use resistance_core::{
    BehaviorKey, BehaviorModel, BeliefState, DualSolver, GameConfig, MissionOutcome,
    ResultSequence, Solver, win_chance, win_chance_real,
};

fn opening(config: &GameConfig) -> (ResultSequence, BeliefState) {
    (
        ResultSequence::new(),
        BeliefState::uniform(config.hypothesis_space()),
    )
}

#[test]
fn tuned_opening_value_is_reproducible() {
    let config = GameConfig::seven_player();
    let model = BehaviorModel::tuned();
    assert_eq!(model.get(&BehaviorKey::new(1, 1, 0)), Some(0.2));
    assert_eq!(model.get(&BehaviorKey::new(1, 2, 0)), Some(0.0));
    let (results, belief) = opening(&config);

    let first = win_chance(&config, &model, 1, &results, &belief).unwrap();
    let second = win_chance(&config, &model, 1, &results, &belief).unwrap();
    assert!(first > 0.0 && first < 1.0, "got {first}");
    assert_eq!(first.to_bits(), second.to_bits());
}

#[test]
fn aggressive_spies_do_not_help_the_resistance() {
    let config = GameConfig::seven_player();
    let (results, belief) = opening(&config);
    let always = BehaviorModel::constant(&config, 1.0).unwrap();
    let rarely = BehaviorModel::constant(&config, 0.1).unwrap();

    let against_always = win_chance(&config, &always, 1, &results, &belief).unwrap();
    let against_rarely = win_chance(&config, &rarely, 1, &results, &belief).unwrap();
    assert!(
        against_always <= against_rarely + 1e-12,
        "{against_always} > {against_rarely}"
    );
}

#[test]
fn raising_one_sabotage_entry_can_help_the_resistance() {
    let config = GameConfig::seven_player();
    let (results, belief) = opening(&config);
    let base = BehaviorModel::constant(&config, 0.3).unwrap();
    let raised = base
        .clone()
        .with_entry(BehaviorKey::new(1, 2, 0), 0.4)
        .unwrap();

    let before = win_chance(&config, &base, 1, &results, &belief).unwrap();
    let after = win_chance(&config, &raised, 1, &results, &belief).unwrap();
    // Two spies failing the opening pair more often exposes them.
    assert!((before - 0.4992857142857143).abs() < 1e-12, "before {before}");
    assert!((after - 0.5106571428571429).abs() < 1e-12, "after {after}");
    assert!(after > before);
}

#[test]
fn dual_model_with_shared_model_matches_single_model_along_history() {
    let config = GameConfig::seven_player();
    let model = BehaviorModel::constant(&config, 0.7).unwrap();
    let histories = [
        vec![],
        vec![MissionOutcome::Success],
        vec![MissionOutcome::Fail],
        vec![MissionOutcome::Success, MissionOutcome::Fail],
        vec![MissionOutcome::Fail, MissionOutcome::Fail],
    ];
    let belief = BeliefState::uniform(config.hypothesis_space());
    let mut single = Solver::new(&config, &model);
    let mut dual = DualSolver::new(&config, &model, &model);
    for history in histories {
        let round = history.len() as u8 + 1;
        let results = ResultSequence::from_outcomes(history);
        let expected = single.win_chance(round, &results, &belief).unwrap();
        let actual = dual
            .win_chance_real(round, &results, &belief, &belief)
            .unwrap();
        assert!(
            (expected - actual).abs() < 1e-12,
            "history {results}: {expected} vs {actual}"
        );
    }
}

#[test]
fn free_function_dual_matches_solver() {
    let config = GameConfig::seven_player();
    let assumed = BehaviorModel::constant(&config, 0.999).unwrap();
    let actual = BehaviorModel::constant(&config, 0.5).unwrap();
    let (results, belief) = opening(&config);
    let via_fn =
        win_chance_real(&config, &assumed, &actual, 1, &results, &belief, &belief).unwrap();
    let via_solver = DualSolver::without_cache(&config, &assumed, &actual)
        .win_chance_real(1, &results, &belief, &belief)
        .unwrap();
    assert_eq!(via_fn.to_bits(), via_solver.to_bits());
    assert!((0.0..=1.0).contains(&via_fn));
}

#[test]
fn posterior_stays_normalized_along_a_played_line() {
    let config = GameConfig::seven_player();
    let model = BehaviorModel::tuned();
    let (mut results, mut belief) = opening(&config);
    let line = [
        MissionOutcome::Success,
        MissionOutcome::Fail,
        MissionOutcome::Success,
    ];
    let mut solver = Solver::new(&config, &model);
    for (idx, outcome) in line.into_iter().enumerate() {
        let round = idx as u8 + 1;
        let choice = solver.best_team(round, &results, &belief).unwrap().unwrap();
        let ctx = resistance_core::MissionCtx::new(&config, round, choice.team, &results);
        let next = belief.update_on_outcome(&ctx, &model, outcome).unwrap();
        assert!(next.is_normalized(1e-9), "round {round}: {}", next.total());
        results = results.extended(outcome);
        belief = next;
    }
    assert_eq!(results.len(), 3);
}
