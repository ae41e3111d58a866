//! Trait de operações de CPU.
//!
//! Abstrai as operações privilegiadas básicas para que o restante do
//! kernel não dependa diretamente de assembly x86.

pub trait CpuOps {
    /// Suspende a CPU até a próxima interrupção.
    fn halt();

    /// Desabilita interrupções (CLI).
    fn disable_interrupts();

    /// Habilita interrupções (STI).
    fn enable_interrupts();

    /// Verifica o bit IF do RFLAGS.
    fn interrupts_enabled() -> bool;

    /// Trava a CPU permanentemente.
    fn hang() -> ! {
        loop {
            Self::disable_interrupts();
            Self::halt();
        }
    }
}
