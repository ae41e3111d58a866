//! Timer do sistema.
//!
//! Dois modos, um ativo por vez:
//! - PIT (modo UEFI/legado): IRQ0, vetor 32;
//! - APIC timer: vetor 48.
//!
//! O driver ativo registra seu vetor aqui; o dispatcher de interrupções
//! consulta `is_timer_vector` para acionar o tick + caminho de
//! preempção.

pub mod apic;
pub mod pit;

use core::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};

static TICKS: AtomicU64 = AtomicU64::new(0);
static ACTIVE_VECTOR: AtomicU8 = AtomicU8::new(0);
static FREQUENCY_HZ: AtomicU32 = AtomicU32::new(0);

/// Inicializa o timer no modo PIT (vetor 32). Retorna a frequência
/// efetivamente programada.
pub fn init(freq_hz: u32) -> u32 {
    let actual = pit::init(freq_hz);
    FREQUENCY_HZ.store(actual, Ordering::Relaxed);
    ACTIVE_VECTOR.store(crate::arch::x86_64::interrupts::PIC_BASE_VECTOR, Ordering::Relaxed);
    crate::drivers::pic::unmask(0);
    actual
}

/// Inicializa o timer no modo APIC (vetor 48).
pub fn init_apic(freq_hz: u32) -> u32 {
    apic::init(freq_hz);
    FREQUENCY_HZ.store(freq_hz, Ordering::Relaxed);
    ACTIVE_VECTOR.store(crate::arch::x86_64::interrupts::APIC_TIMER_VECTOR, Ordering::Relaxed);
    freq_hz
}

/// O vetor dado é o do timer ativo?
pub fn is_timer_vector(vec: u8) -> bool {
    let active = ACTIVE_VECTOR.load(Ordering::Relaxed);
    active != 0 && vec == active
}

/// Tick: chamado pelo dispatcher no vetor do timer.
pub fn handle_tick() {
    TICKS.fetch_add(1, Ordering::Relaxed);
}

/// Ticks desde o boot.
pub fn ticks() -> u64 {
    TICKS.load(Ordering::Relaxed)
}

/// Uptime aproximado em milissegundos.
pub fn uptime_ms() -> u64 {
    let freq = FREQUENCY_HZ.load(Ordering::Relaxed) as u64;
    if freq == 0 {
        return 0;
    }
    TICKS.load(Ordering::Relaxed) * 1000 / freq
}
