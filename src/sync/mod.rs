//! Primitivas de sincronização.
//!
//! Num kernel single-CPU o único primitivo realmente necessário é o par
//! (IRQ-off, flag atômica): o Spinlock daqui implementa exatamente isso.
//! O ring de teclado usa `spin::Mutex` (produtor em IRQ, consumidor em
//! task) — ver `drivers::keyboard`.

pub mod spinlock;

pub use spinlock::Spinlock;
