use std::io::{self, BufRead};

use anyhow::{Context, Result};
use docbridge::{InMemoryCounters, SinkTask, TaskLifecycle};
use docbridge_local::LocalFactory;
use docbridge_types::{Fields, Tuple, Value};

use super::TaskArgs;

/// Execute the `write` command: one JSON array per stdin line becomes one document.
pub fn execute(args: &TaskArgs) -> Result<()> {
    let spec = args.spec()?;
    let fields = spec.fields.clone();
    let mut task = SinkTask::new(spec, args.factory());
    task.configure(&args.task_config()?)
        .context("Failed to configure write task")?;

    let written = ingest(&mut task, &fields, io::stdin().lock());

    let counters = InMemoryCounters::new();
    let closed = task.close(&counters);
    let rows = written?;
    closed.context("Failed to close write task")?;

    tracing::info!(resource = args.resource, rows, "write finished");
    super::print_counters(&counters);
    Ok(())
}

fn ingest(task: &mut SinkTask<LocalFactory>, fields: &Fields, input: impl BufRead) -> Result<u64> {
    task.open().context("Failed to open write task")?;
    let mut rows = 0_u64;
    for (idx, line) in input.lines().enumerate() {
        let line = line.context("Failed to read stdin")?;
        if line.trim().is_empty() {
            continue;
        }
        let values: Vec<Value> = serde_json::from_str(&line)
            .with_context(|| format!("Line {}: expected a JSON array", idx + 1))?;
        let tuple = Tuple::with_values(fields.clone(), values)
            .with_context(|| format!("Line {}: tuple does not match --fields", idx + 1))?;
        task.write_one(&tuple)
            .with_context(|| format!("Line {}: write failed", idx + 1))?;
        rows += 1;
    }
    Ok(rows)
}
