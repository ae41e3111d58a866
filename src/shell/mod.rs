//! Shell embutido do kernel.
//!
//! Alimentado por polling a partir do loop ocioso: cada chamada de
//! `poll()` drena o que houver no buffer do teclado, ecoa e executa a
//! linha quando chega `\n`. Único comando que toca o core é o `run`
//! (loader ELF).

pub mod commands;

use crate::sync::Spinlock;
use alloc::string::String;

pub const PROMPT: &str = "ember> ";

struct ShellState {
    line: String,
    cwd: String,
}

static SHELL: Spinlock<ShellState> = Spinlock::new(ShellState {
    line: String::new(),
    cwd: String::new(),
});

/// Banner + primeiro prompt.
pub fn init() {
    {
        let mut sh = SHELL.lock();
        sh.cwd = String::from("/");
        sh.line.clear();
    }
    crate::kprintln!();
    crate::kprintln!("Cinder OS — kernel Ember v{}", env!("CARGO_PKG_VERSION"));
    crate::kprintln!("Digite 'help' para a lista de comandos.");
    crate::kprint!("{}", PROMPT);
}

/// Drena o teclado; executa a linha quando completa. Retorna true se
/// algo foi processado (para a contabilidade de atividade do idle).
pub fn poll() -> bool {
    let mut activity = false;

    while let Some(c) = crate::drivers::keyboard::try_getchar() {
        activity = true;
        match c {
            b'\n' => {
                crate::kprintln!();
                let line = {
                    let mut sh = SHELL.lock();
                    let l = sh.line.clone();
                    sh.line.clear();
                    l
                };
                run_line(&line);
                crate::kprint!("{}", PROMPT);
            }
            0x08 => {
                let mut sh = SHELL.lock();
                if sh.line.pop().is_some() {
                    drop(sh);
                    crate::kprint!("\x08");
                }
            }
            c if (0x20..0x7F).contains(&c) => {
                SHELL.lock().line.push(c as char);
                crate::kprint!("{}", c as char);
            }
            _ => {}
        }
    }

    activity
}

/// Diretório corrente do shell.
pub fn cwd() -> String {
    SHELL.lock().cwd.clone()
}

fn set_cwd(path: String) {
    SHELL.lock().cwd = path;
}

/// Resolve um argumento de caminho contra o cwd (sem `..`).
pub fn resolve_arg(arg: &str) -> String {
    if arg.starts_with('/') {
        return String::from(arg);
    }
    let base = cwd();
    let mut s = base.clone();
    if !s.ends_with('/') {
        s.push('/');
    }
    s.push_str(arg);
    s
}

fn run_line(line: &str) {
    let mut parts = line.trim().split_whitespace();
    let cmd = match parts.next() {
        Some(c) => c,
        None => return,
    };
    let rest: alloc::vec::Vec<&str> = parts.collect();

    match cmd {
        "help" => commands::cmd_help(),
        "echo" => commands::cmd_echo(&rest),
        "clear" => commands::cmd_clear(),
        "mem" => commands::cmd_mem(),
        "ls" => commands::cmd_ls(&rest),
        "cat" => commands::cmd_cat(&rest),
        "ver" => commands::cmd_ver(),
        "uptime" => commands::cmd_uptime(),
        "cd" => commands::cmd_cd(&rest, set_cwd),
        "pwd" => commands::cmd_pwd(),
        "devices" => commands::cmd_devices(),
        "run" => commands::cmd_run(&rest),
        _ => crate::kprintln!("comando desconhecido: '{}' (tente 'help')", cmd),
    }
}
