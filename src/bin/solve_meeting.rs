//! Meeting-scheduling negotiation solver binary.
//!
//! Usage:
//!   cargo run --release --bin solve_meeting -- [OPTIONS]
//!
//! Options:
//!   --iterations <N>     CFR iterations (default: 20000)
//!   --exact              Exact traversal instead of external sampling
//!   --timeout <SECS>     Wall-clock training budget in seconds
//!   --seed <N>           Random seed (optional)
//!   --players <N>        2 or 3 player scenario (default: 2)
//!   --simulations <N>    UCT simulations for the baseline (default: 5000)
//!   --playouts <N>       Self-play playouts for the outcome report (default: 10000)

use std::env;
use std::process;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use rustc_hash::FxHashMap;

use negotiation_solver::cfr::{
    nash_conv, CfrConfig, CfrSolver, Game, GameAction, MctsConfig, MctsSolver, SolverError,
};
use negotiation_solver::games::negotiation::{
    NegotiationAction, NegotiationConfig, NegotiationGame, NegotiationState, Outcome, Slot,
};

struct Options {
    iterations: u64,
    exact: bool,
    timeout: Option<Duration>,
    seed: Option<u64>,
    players: usize,
    simulations: u64,
    playouts: u64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            iterations: 20_000,
            exact: false,
            timeout: None,
            seed: None,
            players: 2,
            simulations: 5_000,
            playouts: 10_000,
        }
    }
}

fn print_help() {
    println!("Usage: solve_meeting [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --iterations <N>     CFR iterations (default: 20000)");
    println!("  --exact              Exact traversal instead of external sampling");
    println!("  --timeout <SECS>     Wall-clock training budget in seconds");
    println!("  --seed <N>           Random seed");
    println!("  --players <N>        2 or 3 player scenario (default: 2)");
    println!("  --simulations <N>    UCT simulations for the baseline (default: 5000)");
    println!("  --playouts <N>       Self-play playouts (default: 10000)");
}

fn parse_args() -> Option<Options> {
    let args: Vec<String> = env::args().collect();
    let mut opts = Options::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--iterations" | "-i" => {
                i += 1;
                opts.iterations = args.get(i)?.parse().ok()?;
            }
            "--exact" => {
                opts.exact = true;
            }
            "--timeout" => {
                i += 1;
                let secs: u64 = args.get(i)?.parse().ok()?;
                opts.timeout = Some(Duration::from_secs(secs));
            }
            "--seed" | "-s" => {
                i += 1;
                opts.seed = Some(args.get(i)?.parse().ok()?);
            }
            "--players" | "-p" => {
                i += 1;
                opts.players = args.get(i)?.parse().ok()?;
            }
            "--simulations" => {
                i += 1;
                opts.simulations = args.get(i)?.parse().ok()?;
            }
            "--playouts" => {
                i += 1;
                opts.playouts = args.get(i)?.parse().ok()?;
            }
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                print_help();
                return None;
            }
        }
        i += 1;
    }
    Some(opts)
}

fn slot_map(entries: &[(u32, f64)]) -> FxHashMap<Slot, f64> {
    entries.iter().map(|&(s, v)| (Slot(s), v)).collect()
}

/// The two-player scenario: slots Mon=0, Tue=1, Wed=2. Both players can
/// make Wednesday, and Wednesday is the only slot both value.
fn two_player_scenario() -> Result<NegotiationGame, SolverError> {
    NegotiationGame::new(
        vec![
            slot_map(&[(0, 5.0), (1, 0.0), (2, 3.0)]),
            slot_map(&[(0, 0.0), (1, 4.0), (2, 3.0)]),
        ],
        vec![vec![Slot(0), Slot(2)], vec![Slot(1), Slot(2)]],
        NegotiationConfig::default(),
    )
}

fn three_player_scenario() -> Result<NegotiationGame, SolverError> {
    NegotiationGame::new(
        vec![
            slot_map(&[(0, 5.0), (1, 1.0), (2, 3.0), (3, 2.0)]),
            slot_map(&[(0, 1.0), (1, 5.0), (2, 3.0), (3, 2.0)]),
            slot_map(&[(0, 2.0), (1, 1.0), (2, 3.0), (3, 5.0)]),
        ],
        vec![
            vec![Slot(0), Slot(2), Slot(3)],
            vec![Slot(1), Slot(2), Slot(3)],
            vec![Slot(2), Slot(3)],
        ],
        NegotiationConfig::default(),
    )
}

fn slot_name(slot: Slot) -> &'static str {
    match slot.0 {
        0 => "Mon",
        1 => "Tue",
        2 => "Wed",
        3 => "Thu",
        _ => "?",
    }
}

/// One playout where every player samples from the trained average strategy.
fn self_play(
    game: &NegotiationGame,
    solver: &CfrSolver<NegotiationGame>,
    seed: u64,
) -> Result<(NegotiationState, Vec<f64>), SolverError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut state = game.initial_state();
    while !game.is_terminal(&state) {
        let actor = game
            .current_player(&state)
            .ok_or(SolverError::InvalidState("non-terminal state without actor"))?;
        let strategy = solver.get_average_strategy(&state, actor)?;
        let r: f64 = rng.gen();
        let mut cumsum = 0.0;
        let mut chosen = strategy.len() - 1;
        for (i, (_, prob)) in strategy.iter().enumerate() {
            cumsum += prob;
            if r < cumsum {
                chosen = i;
                break;
            }
        }
        let action = strategy[chosen].0;
        state = game.apply_action(&state, &action)?;
    }
    let returns = game.returns(&state);
    Ok((state, returns))
}

fn run(opts: Options) -> Result<(), SolverError> {
    let game = match opts.players {
        2 => two_player_scenario()?,
        3 => three_player_scenario()?,
        n => {
            return Err(SolverError::UnsupportedTopology(format!(
                "no built-in scenario for {} players",
                n
            )))
        }
    };
    let num_players = game.num_players();

    println!("=================================================");
    println!("  Meeting Negotiation Solver ({} players)", num_players);
    println!("=================================================");
    println!();

    let mut config = if opts.exact {
        CfrConfig::exact()
    } else {
        CfrConfig::default()
    };
    if let Some(seed) = opts.seed {
        config = config.with_seed(seed);
    }
    if let Some(timeout) = opts.timeout {
        config = config.with_timeout(timeout);
    }

    let mut solver = CfrSolver::new(game.clone(), config)?;

    let bar = ProgressBar::new(opts.iterations);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-"),
    );

    let report = solver.train_with_callback(opts.iterations, 100, |stats| {
        bar.set_position(stats.iterations);
        bar.set_message(format!(
            "{} info sets, regret {:.5}",
            stats.info_sets, stats.mean_positive_regret
        ));
    })?;
    bar.finish_and_clear();

    info!(
        "training stopped: {:?} after {} iterations",
        report.stop, report.stats.iterations
    );
    println!("Training: {:?}", report.stop);
    println!("  iterations:        {}", report.stats.iterations);
    println!("  info sets:         {}", report.stats.info_sets);
    println!("  elapsed:           {:.2}s", report.stats.elapsed_seconds);
    println!("  iterations/sec:    {:.0}", report.stats.iterations_per_second);
    println!("  failed iterations: {}", report.stats.failed_iterations);
    println!("  mean +regret:      {:.6}", report.stats.mean_positive_regret);
    println!();

    // Opening strategy for player 0.
    let root = game.initial_state();
    println!("Player 0 opening proposal:");
    for (action, prob) in solver.get_average_strategy(&root, 0)? {
        println!("  {:<14} {:>6.2}%", action.label(), prob * 100.0);
    }
    println!();

    // Strategy quality.
    let quality = nash_conv(&game, &solver)?;
    println!("NashConv: {:.4}", quality.nash_conv);
    for (player, gap) in quality.exploitability.iter().enumerate() {
        println!("  player {} exploitable by {:.4}", player, gap);
    }
    println!();

    // Expected outcome under average-strategy self-play.
    let base_seed = opts.seed.unwrap_or(0);
    let results: Vec<(NegotiationState, Vec<f64>)> = (0..opts.playouts)
        .into_par_iter()
        .map(|i| self_play(&game, &solver, base_seed.wrapping_add(i)))
        .collect::<Result<_, _>>()?;
    let mut mean_returns = vec![0.0; num_players];
    let mut agreements = 0u64;
    for (state, returns) in &results {
        if matches!(state.outcome, Some(Outcome::Agreement(_))) {
            agreements += 1;
        }
        for (acc, &r) in mean_returns.iter_mut().zip(returns.iter()) {
            *acc += r / results.len() as f64;
        }
    }
    println!("Self-play over {} playouts:", opts.playouts);
    println!(
        "  agreement rate: {:.1}%",
        agreements as f64 / results.len() as f64 * 100.0
    );
    for (player, mean) in mean_returns.iter().enumerate() {
        println!("  player {} mean payoff: {:.3}", player, mean);
    }
    println!();

    // UCT baseline on the perfect-information variant.
    let mcts_config = match opts.seed {
        Some(seed) => MctsConfig::new()
            .with_simulations(opts.simulations)
            .with_seed(seed),
        None => MctsConfig::new().with_simulations(opts.simulations),
    };
    let mut mcts = MctsSolver::new(game.clone(), mcts_config)?;
    let result = mcts.solve()?;
    println!(
        "UCT baseline ({} simulations, {} nodes):",
        result.root_visits,
        mcts.tree_size()
    );
    for (player, action) in &result.path {
        let note = match action {
            NegotiationAction::Propose(slot) => {
                format!("{} ({})", action.label(), slot_name(*slot))
            }
            _ => action.label(),
        };
        println!("  player {}: {}", player, note);
    }
    println!("  line-of-play returns: {:?}", result.expected_returns);

    Ok(())
}

fn main() {
    env_logger::init();
    let opts = match parse_args() {
        Some(opts) => opts,
        None => process::exit(1),
    };
    if let Err(err) = run(opts) {
        eprintln!("error: {}", err);
        process::exit(1);
    }
}
