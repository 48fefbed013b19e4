use std::io::{self, BufWriter, Write};

use anyhow::{Context, Result};
use docbridge::{InMemoryCounters, SourceTask, TaskLifecycle};
use docbridge_local::LocalFactory;
use docbridge_types::Tuple;

use super::TaskArgs;

/// Execute the `read` command: scroll the resource and print tuples to stdout.
pub fn execute(args: &TaskArgs, query: Option<&str>) -> Result<()> {
    let mut spec = args.spec()?;
    if let Some(query) = query {
        spec = spec.query(query);
    }
    let fields = spec.fields.clone();
    let mut task = SourceTask::new(spec, args.factory());
    task.configure(&args.task_config()?)
        .context("Failed to configure read task")?;

    let streamed = stream(&mut task, Tuple::new(fields));

    let counters = InMemoryCounters::new();
    let closed = task.close(&counters);
    let rows = streamed?;
    closed.context("Failed to close read task")?;

    tracing::info!(resource = args.resource, rows, "read finished");
    super::print_counters(&counters);
    Ok(())
}

fn stream(task: &mut SourceTask<LocalFactory>, mut tuple: Tuple) -> Result<u64> {
    task.open().context("Failed to open read task")?;
    let mut out = BufWriter::new(io::stdout().lock());
    let mut rows = 0_u64;
    while task.read_next(&mut tuple)? {
        serde_json::to_writer(&mut out, tuple.values())?;
        out.write_all(b"\n")?;
        rows += 1;
    }
    out.flush()?;
    Ok(rows)
}
