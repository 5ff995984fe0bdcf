#[cfg(test)]
mod tests {
    use task_pool::{
        config::Config,
        pool::TaskPool,
    };
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        thread,
        time::{Duration, Instant},
    };

    fn measure<F, T>(name: &str, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        let start = Instant::now();
        let result = f();
        let elapsed = start.elapsed();
        println!("✓ {}: {:?}", name, elapsed);
        result
    }

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn load_test_1_small_fast_tasks() {
        init_logger();
        println!("\n=== LOAD TEST 1: 100k мгновенных задач ===");
        let pool = TaskPool::with_config(Config::cpu_bound()).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        measure("100k tasks", || {
            for i in 0..100_000usize {
                let counter = counter.clone();
                pool.submit(move |x: usize| counter.fetch_add(x % 2, Ordering::Relaxed), i)
                    .unwrap();
            }
            pool.shutdown();
        });

        assert_eq!(counter.load(Ordering::Relaxed), 50_000);
        let metrics = pool.metrics();
        println!("  Успешно: {}/{}", metrics.completed_tasks, metrics.total_spawned);
        assert_eq!(metrics.completed_tasks, 100_000);
    }

    #[test]
    fn load_test_2_blocking_tasks() {
        init_logger();
        println!("\n=== LOAD TEST 2: 1k блокирующих задач (1ms каждая) ===");
        let pool = TaskPool::with_config(Config::io_bound()).unwrap();
        let workers = pool.num_workers();

        let elapsed = measure("1k blocking tasks", || {
            let start = Instant::now();
            for _ in 0..1_000 {
                pool.submit(thread::sleep, Duration::from_millis(1)).unwrap();
            }
            pool.shutdown();
            start.elapsed()
        });

        println!("  Воркеров: {}", workers);
        assert_eq!(pool.metrics().completed_tasks, 1_000);
        // последовательное выполнение заняло бы не меньше секунды
        if workers >= 4 {
            assert!(elapsed < Duration::from_millis(1_000));
        }
    }

    #[test]
    fn load_test_3_stress_with_panics() {
        init_logger();
        println!("\n=== LOAD TEST 3: Стресс-тест с паниками ===");
        let pool = TaskPool::new(Some(8)).unwrap();
        let failures = pool.failures();

        let handles: Vec<_> = measure("1k tasks (10% panic)", || {
            (0..1_000)
                .map(|x: u32| {
                    pool.submit_with_handle(
                        |x: u32| {
                            if x % 10 == 0 {
                                panic!("Intentional panic at {}", x);
                            }
                            x
                        },
                        x,
                    )
                    .unwrap()
                })
                .collect()
        });

        let results: Vec<_> = handles.into_iter().map(|h| h.join()).collect();
        let successful = results.iter().filter(|r| r.is_ok()).count();
        let panicked = results.len() - successful;
        pool.shutdown();

        println!("  Успешно: {}", successful);
        println!("  Паник перехвачено: {}", panicked);
        let metrics = pool.metrics();
        println!("  Pool success rate: {:.1}%", metrics.success_rate() * 100.0);

        assert_eq!(successful, 900);
        assert_eq!(metrics.failed_tasks, 100);
        assert_eq!(failures.try_iter().count(), 100);
        assert_eq!(metrics.respawned_workers, 0);
    }

    #[test]
    fn load_test_4_bounded_queue_backpressure() {
        init_logger();
        println!("\n=== LOAD TEST 4: Ограниченная очередь под нагрузкой ===");
        let config = Config::builder().num_threads(4).max_pending(16).build().unwrap();
        let pool = Arc::new(TaskPool::with_config(config).unwrap());
        let counter = Arc::new(AtomicUsize::new(0));

        measure("4 producers x 5k tasks", || {
            let producers: Vec<_> = (0..4)
                .map(|_| {
                    let pool = pool.clone();
                    let counter = counter.clone();
                    thread::spawn(move || {
                        for _ in 0..5_000 {
                            let counter = counter.clone();
                            pool.execute(move || {
                                counter.fetch_add(1, Ordering::Relaxed);
                            })
                            .unwrap();
                            assert!(pool.queued_tasks() <= 16);
                        }
                    })
                })
                .collect();
            for p in producers {
                p.join().unwrap();
            }
            pool.shutdown();
        });

        assert_eq!(counter.load(Ordering::Relaxed), 20_000);
        assert_eq!(pool.metrics().rejected_tasks, 0);
    }
}
