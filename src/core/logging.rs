//! Sistema de Logging do Kernel — Ember
//! ====================================
//!
//! Logger com filtragem por nível, cores ANSI e IRQ-safe.
//!
//! # Níveis de Log
//! - `ERROR`: Erros críticos (sempre visíveis)
//! - `WARN`: Situações suspeitas
//! - `INFO`: Fluxo normal de execução
//! - `DEBUG`: Informações de debug
//! - `TRACE`: Detalhes extremos (feature `verbose_logs`)
//!
//! # Segurança
//! - Desabilita interrupções durante a escrita
//! - Usa try_lock para evitar deadlock se a serial já estiver tomada
//! - Zero alocações durante o log
//!
//! Em builds de teste (host) o sink é um no-op: nada de I/O de porta.

#[cfg(not(test))]
use crate::arch::traits::CpuOps;
#[cfg(not(test))]
use crate::arch::Cpu;
use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Níveis de log — valores menores = mais críticos.
#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl LogLevel {
    /// Prefixo colorido ANSI para o nível.
    #[inline]
    pub fn prefix(self) -> &'static str {
        match self {
            LogLevel::Error => "\x1b[1;31m[ERRO]\x1b[0m",
            LogLevel::Warn => "\x1b[1;33m[WARN]\x1b[0m",
            LogLevel::Info => "\x1b[32m[INFO]\x1b[0m",
            LogLevel::Debug => "\x1b[36m[DEBG]\x1b[0m",
            LogLevel::Trace => "\x1b[35m[TRAC]\x1b[0m",
        }
    }

    /// Prefixo sem cores.
    #[inline]
    pub fn prefix_plain(self) -> &'static str {
        match self {
            LogLevel::Error => "[ERRO]",
            LogLevel::Warn => "[WARN]",
            LogLevel::Info => "[INFO]",
            LogLevel::Debug => "[DEBG]",
            LogLevel::Trace => "[TRAC]",
        }
    }
}

// Configuração global:
// - Feature 'verbose_logs': nível Trace (todos os logs)
// - Sem feature: nível Info
#[cfg(feature = "verbose_logs")]
static GLOBAL_LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Trace as u8);

#[cfg(not(feature = "verbose_logs"))]
static GLOBAL_LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

static COLORS_ENABLED: AtomicBool = AtomicBool::new(true);

/// Ajusta o nível global em runtime.
pub fn set_level(level: LogLevel) {
    GLOBAL_LOG_LEVEL.store(level as u8, Ordering::Relaxed);
}

/// Logger global do kernel.
pub struct KernelLogger;

impl KernelLogger {
    /// Log com nível específico.
    pub fn log(level: LogLevel, args: fmt::Arguments) {
        #[cfg(test)]
        {
            let _ = (level, args);
        }
        #[cfg(not(test))]
        {
            let current = GLOBAL_LOG_LEVEL.load(Ordering::Relaxed);
            if (level as u8) > current {
                return;
            }

            // Seção crítica (IRQ-safe)
            let irq_enabled = Cpu::interrupts_enabled();
            if irq_enabled {
                Cpu::disable_interrupts();
            }

            if let Some(mut serial) = crate::drivers::serial::SERIAL.try_lock() {
                let prefix = if COLORS_ENABLED.load(Ordering::Relaxed) {
                    level.prefix()
                } else {
                    level.prefix_plain()
                };
                let _ = fmt::write(&mut *serial, format_args!("{} ", prefix));
                let _ = fmt::write(&mut *serial, args);
                let _ = fmt::write(&mut *serial, format_args!("\n"));
            }

            if irq_enabled {
                Cpu::enable_interrupts();
            }
        }
    }

    /// Impressão crua (sem prefixo) — espelhada na serial e no console
    /// de vídeo quando inicializado. Usada por kprint!/printk.
    pub fn print(args: fmt::Arguments) {
        #[cfg(test)]
        {
            let _ = args;
        }
        #[cfg(not(test))]
        {
            let irq_enabled = Cpu::interrupts_enabled();
            if irq_enabled {
                Cpu::disable_interrupts();
            }

            if let Some(mut serial) = crate::drivers::serial::SERIAL.try_lock() {
                let _ = fmt::write(&mut *serial, args);
            }
            crate::drivers::video::console::write_args(args);

            if irq_enabled {
                Cpu::enable_interrupts();
            }
        }
    }
}

/// printk — saída de diagnóstico do kernel (console + serial).
#[macro_export]
macro_rules! kprint {
    ($($arg:tt)*) => ($crate::core::logging::KernelLogger::print(format_args!($($arg)*)));
}

#[macro_export]
macro_rules! kprintln {
    () => ($crate::kprint!("\n"));
    ($($arg:tt)*) => ($crate::kprint!("{}\n", format_args!($($arg)*)));
}

#[macro_export]
macro_rules! kerror {
    ($($arg:tt)*) => ($crate::core::logging::KernelLogger::log(
        $crate::core::logging::LogLevel::Error,
        format_args!($($arg)*)
    ));
}

#[macro_export]
macro_rules! kwarn {
    ($($arg:tt)*) => ($crate::core::logging::KernelLogger::log(
        $crate::core::logging::LogLevel::Warn,
        format_args!($($arg)*)
    ));
}

#[macro_export]
macro_rules! kinfo {
    ($($arg:tt)*) => ($crate::core::logging::KernelLogger::log(
        $crate::core::logging::LogLevel::Info,
        format_args!($($arg)*)
    ));
}

#[macro_export]
macro_rules! kdebug {
    ($($arg:tt)*) => ($crate::core::logging::KernelLogger::log(
        $crate::core::logging::LogLevel::Debug,
        format_args!($($arg)*)
    ));
}

#[macro_export]
macro_rules! ktrace {
    ($($arg:tt)*) => ($crate::core::logging::KernelLogger::log(
        $crate::core::logging::LogLevel::Trace,
        format_args!($($arg)*)
    ));
}

/// Log OK (verde) — para status de inicialização.
#[macro_export]
macro_rules! kok {
    ($($arg:tt)*) => {{
        $crate::kprint!("\x1b[32m[OK]\x1b[0m ");
        $crate::kprintln!($($arg)*);
    }};
}

/// Log FAIL (vermelho) — para status de falha.
#[macro_export]
macro_rules! kfail {
    ($($arg:tt)*) => {{
        $crate::kprint!("\x1b[1;31m[FAIL]\x1b[0m ");
        $crate::kprintln!($($arg)*);
    }};
}
