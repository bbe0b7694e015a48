use std::error::Error;
use std::fmt::{Display, Formatter};
use std::thread;
use std::time::{Duration, Instant};

use log::{info, warn};
use structopt::StructOpt;

use strand::Future;

#[derive(Debug, StructOpt)]
#[structopt(name = "fanout")]
struct Opts {
    /// Number of tasks to start
    #[structopt(long, default_value = "8")]
    tasks: usize,

    /// Simulated work per task in milliseconds
    #[structopt(long, default_value = "100")]
    work_ms: u64,

    /// Fail every Nth task (0 to disable)
    #[structopt(long, default_value = "0")]
    fail_every: usize,

    /// Substitute this value for failed tasks instead of failing the run
    #[structopt(long)]
    fallback: Option<u64>,
}

#[derive(Debug)]
struct TaskFailed(usize);

impl Display for TaskFailed {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "task {} failed", self.0)
    }
}

impl Error for TaskFailed {}

fn square_slowly((i, work, fail): (usize, Duration, bool)) -> Result<u64, TaskFailed> {
    thread::sleep(work);
    if fail {
        return Err(TaskFailed(i));
    }
    Ok((i * i) as u64)
}

fn main() -> anyhow::Result<()> {
    env_logger::builder().format_timestamp_micros().init();
    let opts: Opts = Opts::from_args();
    let start = Instant::now();
    info!("Starting {} tasks...", opts.tasks);

    let work = Duration::from_millis(opts.work_ms);
    let tasks: Vec<Future<u64, TaskFailed>> = (0..opts.tasks)
        .map(|i| {
            let fail = opts.fail_every != 0 && (i + 1) % opts.fail_every == 0;
            Future::apply(square_slowly, (i, work, fail))
        })
        .collect();

    let tasks = match opts.fallback {
        Some(fallback) => {
            warn!("Failed tasks will count as {}.", fallback);
            tasks.iter().map(|task| task.map_or(fallback, |v| v)).collect()
        }
        None => tasks,
    };

    let total = Future::sequence(tasks).map(|values| values.iter().sum::<u64>());
    let sum = total.join()?;

    info!("Completed in {:?}.", start.elapsed());
    println!("{}", sum);
    Ok(())
}
