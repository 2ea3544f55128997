use std::{thread::sleep, time::Duration};

use task_pool::prelude::*;

fn main() -> task_pool::Result<()> {
    let mut pool = UnorderedPool::with_num_threads(3)?;

    for seconds in [3, 1, 2] {
        pool.submit(Task::with_arg(sleep_for, seconds))?;
    }

    // Completion order: 1, 2, 3
    for task in pool.wait_all()? {
        println!("Task completed after {} seconds", task.into_result()?);
    }

    pool.delete()
}

fn sleep_for(seconds: u64) -> u64 {
    sleep(Duration::from_secs(seconds));
    seconds
}
