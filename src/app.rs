use std::io::Write;

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use logmon_core::{CompiledFilter, LogFile, Monitor, MonitorEvent, MonitorOptions, RecordView};

use crate::output::Printer;

/// One followed log file: the engine, the consumer-side view and the printer
pub struct Session<W: Write> {
    monitor: Monitor,
    events: mpsc::UnboundedReceiver<MonitorEvent>,
    view: RecordView,
    filter: CompiledFilter,
    printer: Printer<W>,
    log: LogFile,
}

impl<W: Write> Session<W> {
    /// Bind a monitor to `log`. Subscribes before initializing so the
    /// initial load arrives as the first update.
    pub fn open(
        log: LogFile,
        options: MonitorOptions,
        filter: CompiledFilter,
        printer: Printer<W>,
    ) -> Result<Self> {
        let monitor = Monitor::new(options);
        let events = monitor.subscribe();
        monitor
            .initialize(&log.path, log.mapping.clone())
            .with_context(|| format!("cannot monitor {}", log.path.display()))?;

        Ok(Self {
            monitor,
            events,
            view: RecordView::new(),
            filter,
            printer,
            log,
        })
    }

    /// Start following. A missing file is not an error; the session waits
    /// for it when the entry auto-starts.
    pub fn start(&self) -> bool {
        let started = self.monitor.run();
        if !started {
            tracing::warn!(path = %self.log.path.display(), "log file not available yet");
        }
        started
    }

    /// Apply every pending notification without waiting
    pub fn drain(&mut self) -> Result<()> {
        while let Ok(event) = self.events.try_recv() {
            self.handle(event)?;
        }
        Ok(())
    }

    /// Process notifications until `shutdown` resolves
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                event = self.events.recv() => match event {
                    Some(event) => self.handle(event)?,
                    None => break,
                },
            }
        }

        self.monitor.stop();
        self.drain()?;
        self.printer.flush()?;
        Ok(())
    }

    fn handle(&mut self, event: MonitorEvent) -> Result<()> {
        let cleared = match &event {
            MonitorEvent::Updated { is_clear, .. } => *is_clear,
            MonitorEvent::FileExistence(exists) => !exists,
            MonitorEvent::RunState(_) => false,
        };
        if cleared {
            self.printer.reset();
        }

        for record in self.view.apply(&event) {
            if self.filter.matches(record) {
                self.printer.record(record, &self.filter)?;
            }
        }
        self.printer.flush()?;

        match event {
            MonitorEvent::FileExistence(true) => {
                tracing::info!(path = %self.log.path.display(), "log file appeared");
                if self.log.auto_start {
                    self.start();
                }
            }
            MonitorEvent::FileExistence(false) => {
                tracing::info!(path = %self.log.path.display(), "log file removed");
            }
            MonitorEvent::RunState(running) => {
                tracing::debug!(running, "monitor run state");
            }
            MonitorEvent::Updated { .. } => {}
        }

        Ok(())
    }

    pub fn view(&self) -> &RecordView {
        &self.view
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }
}
