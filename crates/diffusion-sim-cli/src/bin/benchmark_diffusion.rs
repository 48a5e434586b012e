use diffusion_sim_core::agent::Agent;
use diffusion_sim_core::config::SimConfig;
use diffusion_sim_core::initializer::create_agents_random;
use diffusion_sim_core::scenario::{self, BandSetup};
use diffusion_sim_core::scheduler::{Scheduler, StepTimings};
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;
use serde::Serialize;
use std::time::{Duration, Instant};

#[derive(Debug, Default, Serialize)]
struct PhaseTotals {
    mode: &'static str,
    steps: u32,
    diffusion_us: u64,
    behavior_us: u64,
    commit_us: u64,
    total_us: u64,
}

impl PhaseTotals {
    fn add(&mut self, timings: &StepTimings) {
        self.steps += 1;
        self.diffusion_us += timings.diffusion_us;
        self.behavior_us += timings.behavior_us;
        self.commit_us += timings.commit_us;
        self.total_us += timings.total_us;
    }
}

fn build_scheduler(config: SimConfig, resolution: usize, num_agents: usize) -> Scheduler {
    let bounds = config.bounds();
    let mut rng = ChaCha12Rng::seed_from_u64(config.seed);
    let mut scheduler = Scheduler::new(config).expect("benchmark config is valid");
    let bands = BandSetup {
        resolution,
        amplitude: Some(5000.0),
        ..BandSetup::default()
    };
    scenario::add_banded_substances(&mut scheduler, &bands).expect("bands are stable");
    let agents = create_agents_random(bounds, num_agents, &mut rng, |position| {
        Agent::new(position).with_behavior(scenario::reference_chemotaxis())
    });
    scheduler.add_agents(agents).expect("agents are valid");
    scheduler
}

fn run(
    mode: &'static str,
    parallel: bool,
    resolution: usize,
    num_agents: usize,
    steps: u32,
) -> (Duration, PhaseTotals) {
    let config = SimConfig {
        parallel,
        seed: 42,
        ..SimConfig::default()
    };
    let mut scheduler = build_scheduler(config, resolution, num_agents);
    let mut totals = PhaseTotals {
        mode,
        ..PhaseTotals::default()
    };
    let start = Instant::now();
    for _ in 0..steps {
        let timings = scheduler.step().expect("benchmark run stays stable");
        totals.add(&timings);
    }
    (start.elapsed(), totals)
}

fn main() {
    let resolution = 64;
    let num_agents = 20_000;
    let steps = 20;
    println!(
        "Benchmarking 3 fields of {}^3 cells with {} chemotactic agents",
        resolution, num_agents
    );

    let (duration_seq, seq) = run("sequential", false, resolution, num_agents, steps);
    println!("Time for {} steps SEQUENTIAL: {:?}", steps, duration_seq);
    println!("Avg time per step (sequential): {:?}", duration_seq / steps);

    let (duration_par, par) = run("parallel", true, resolution, num_agents, steps);
    println!("Time for {} steps PARALLEL: {:?}", steps, duration_par);
    println!("Avg time per step (parallel): {:?}", duration_par / steps);

    let speedup = duration_seq.as_secs_f64() / duration_par.as_secs_f64().max(f64::EPSILON);
    println!("Speedup: {:.2}x", speedup);
    for totals in [&seq, &par] {
        println!(
            "{}",
            serde_json::to_string(totals).expect("phase totals serialize")
        );
    }
}
