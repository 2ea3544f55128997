use std::{sync::Arc, thread, time::Duration};

use task_pool::{alloc, queue::TaskQueue, sync::Semaphore};

fn main() -> task_pool::Result<()> {
    // At most two of the five jobs hold a permit at any time.
    let permits = Arc::new(Semaphore::new(2));
    let log = TaskQueue::new(alloc::system());

    let handles = (0..5)
        .map(|job| {
            let permits = permits.clone();
            let log = log.clone();
            thread::spawn(move || -> task_pool::Result<()> {
                permits.wait()?;
                log.submit(format!("job {job} started"))?;
                thread::sleep(Duration::from_millis(200));
                log.submit(format!("job {job} finished"))?;
                permits.post()
            })
        })
        .collect::<Vec<_>>();

    for handle in handles {
        if let Ok(result) = handle.join() {
            result?;
        }
    }

    while let Ok((line, index)) = log.try_accept() {
        println!("{index:>2}: {line}");
    }
    Ok(())
}
