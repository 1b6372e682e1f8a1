//! Full pipeline pass with progress on stdout.

use tokio::runtime::Runtime;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::pipeline::{Pipeline, PipelineContext, PipelineEvent};

/// Run the pipeline once. Ctrl-C asks it to stop after the current batch.
pub fn cmd_run(rt: &Runtime, config: Config) -> anyhow::Result<()> {
    rt.block_on(async {
        println!("Library root: {}", config.library.output_root.display());
        let context = PipelineContext::from_config(config).await?;
        let mut pipeline = Pipeline::new(context);

        let (tx, mut rx) = mpsc::channel(256);
        pipeline.set_event_sender(tx);
        pipeline.start_run()?;

        let mut stopping = false;
        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Some(PipelineEvent::RunFinished { stats, cancelled }) => {
                        println!();
                        if cancelled {
                            println!("Stopped early: {stats}");
                        } else {
                            println!("Done: {stats}");
                        }
                        break;
                    }
                    Some(event) => print_event(&event),
                    None => break,
                },
                _ = tokio::signal::ctrl_c(), if !stopping => {
                    println!("Stopping after the current batch...");
                    stopping = true;
                    if let Err(e) = pipeline.stop_run() {
                        tracing::debug!("Stop request ignored: {}", e);
                    }
                }
            }
        }

        pipeline.wait().await;
        Ok(())
    })
}

fn print_event(event: &PipelineEvent) {
    match event {
        PipelineEvent::RunStarted => println!("Fetching groups..."),
        PipelineEvent::GroupsPlanned { always_on, movies, tv } => {
            println!("Groups: {movies} movie, {tv} TV, {always_on} 24/7");
        }
        PipelineEvent::GroupStarted { category, group, items } => {
            println!("[{category}] {group}: {items} items");
        }
        PipelineEvent::BatchComplete {
            group,
            batch,
            batches,
            ..
        } if *batches > 1 => {
            println!("  {group}: batch {batch}/{batches}");
        }
        PipelineEvent::ShowComplete { show, .. } => println!("  ✓ {show}"),
        _ => {}
    }
}
