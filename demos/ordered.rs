use std::{thread::sleep, time::Duration};

use task_pool::prelude::*;

fn main() -> task_pool::Result<()> {
    let mut pool = Pool::new(4, Delivery::Ordered, None)?;

    pool.submit_all([7, 1, 5, 2, 6, 3, 4, 8].map(|n: u64| {
        Task::new(move || {
            sleep(Duration::from_millis(n * 100));
            n
        })
    }))?;

    // Submission order, even though the short tasks finish first.
    while pool.pending() > 0 {
        match pool.wait_timeout(Duration::from_millis(250)) {
            Ok(task) => println!("Result: {:?}", task.into_result()?),
            Err(Error::Timeout) => println!("Still waiting for {} tasks", pool.pending()),
            Err(err) => return Err(err),
        }
    }

    pool.delete()
}
