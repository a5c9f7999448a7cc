//! Interface de terminal do gallog-cleaner: barra de progresso e saída colorida.
//!
//! Usa as crates `indicatif` para a barra de progresso e `console` para
//! estilização com cores. O [`RunProgressView`] acompanha visualmente
//! uma limpeza no terminal a partir dos eventos de progresso do motor.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc::UnboundedReceiver;

use gallog_cleaner::model::Gallery;
use gallog_cleaner::state_machine::{RunProgress, RunResult, RunState};

/// Indicador visual de progresso de uma limpeza.
///
/// Começa como spinner enquanto o total é desconhecido e vira barra
/// assim que a enumeração termina.
pub struct RunProgressView {
    // Barra/spinner do indicatif.
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
}

impl RunProgressView {
    pub fn start(description: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(description.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Aplica um evento de progresso.
    pub fn update(&self, progress: &RunProgress) {
        if progress.total > 0 && self.pb.length() != Some(progress.total as u64) {
            self.pb.set_length(progress.total as u64);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            {
                self.pb.set_style(style.progress_chars("=> "));
            }
        }
        self.pb.set_position(progress.current as u64);
        self.pb.set_message(progress.message.clone());
    }

    /// Consome eventos até o canal fechar.
    pub async fn follow(&self, rx: &mut UnboundedReceiver<RunProgress>) {
        while let Some(progress) = rx.recv().await {
            self.update(&progress);
        }
    }

    /// Finaliza a barra e exibe o estado final.
    pub fn complete(&self, result: &RunResult) {
        self.pb.finish_and_clear();
        let mark = match result.terminal_state {
            RunState::Completed if result.failed == 0 => self.green.apply_to("✓"),
            RunState::Completed | RunState::Cancelled => self.yellow.apply_to("!"),
            _ => self.red.apply_to("✗"),
        };
        println!("  {mark} {}", result.last_message);
    }

    /// Finaliza a barra sem resultado (erro antes da execução).
    pub fn abandon(&self, message: &str) {
        self.pb.finish_and_clear();
        println!("  {} {message}", self.red.apply_to("✗"));
    }
}

/// Imprime o resultado completo em JSON.
pub fn print_summary(result: &RunResult) {
    let header = match result.terminal_state {
        RunState::Completed => Style::new().green(),
        RunState::Cancelled => Style::new().yellow(),
        _ => Style::new().red(),
    };
    println!();
    println!("{}", header.apply_to("─── Run Result ───"));
    println!("{}", serde_json::to_string_pretty(result).unwrap_or_default());
}

/// Lista galerias, uma por linha.
pub fn print_galleries(galleries: &[Gallery]) {
    if galleries.is_empty() {
        println!("  (nenhuma galeria)");
        return;
    }
    let dim = Style::new().dim();
    for gallery in galleries {
        println!("  {}  {}", gallery.name, dim.apply_to(&gallery.id));
    }
}
