use task_pool::{Config, TaskPool};
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Instant,
};
use log::{error, info};


fn main() {
    env_logger::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let now = Instant::now();
    let pool = match TaskPool::with_config(config) {
        Ok(pool) => pool,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    info!("started {} workers", pool.num_workers());

    let sum = Arc::new(AtomicUsize::new(0));
    for i in 0..1_000_000usize {
        let sum = sum.clone();
        if let Err(e) = pool.submit(move |x: usize| sum.fetch_add(x, Ordering::Relaxed), i) {
            error!("submit failed: {}", e);
            break;
        }
    }

    let squares: Vec<_> = (0..10u64)
        .filter_map(|i| pool.submit_with_handle(|x: u64| x * x, i).ok())
        .collect();
    let total: u64 = futures::executor::block_on(futures::future::join_all(squares))
        .into_iter()
        .filter_map(Result::ok)
        .sum();

    pool.shutdown();
    info!("metrics: {:?}", pool.metrics());
    println!(
        "sum = {}, sum of squares = {}, elapsed: {:?}",
        sum.load(Ordering::Relaxed),
        total,
        now.elapsed()
    );
}
