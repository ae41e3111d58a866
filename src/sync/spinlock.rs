//! Spinlock — bloqueio com busy-wait e interrupções desabilitadas.

use crate::arch::traits::CpuOps;
use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

/// Spinlock IRQ-safe.
///
/// # Quando usar
///
/// - Seções críticas MUITO curtas
/// - Dentro de handlers de interrupção
/// - Quando não se pode chamar o scheduler
///
/// A aquisição desabilita interrupções; o guard restaura IF no drop.
/// Isso colapsa a seção crítica de chamadores em contexto de IRQ na
/// mesma disciplina (IRQ-off + flag) exigida pelo modelo single-CPU.
pub struct Spinlock<T> {
    locked: AtomicBool,
    data: UnsafeCell<T>,
}

// SAFETY: o acesso é protegido pela flag atômica + IRQ-off
unsafe impl<T: Send> Send for Spinlock<T> {}
unsafe impl<T: Send> Sync for Spinlock<T> {}

impl<T> Spinlock<T> {
    pub const fn new(data: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            data: UnsafeCell::new(data),
        }
    }

    /// Adquire o lock (busy-wait).
    pub fn lock(&self) -> SpinlockGuard<'_, T> {
        let interrupts_were_enabled = crate::arch::Cpu::interrupts_enabled();
        crate::arch::Cpu::disable_interrupts();

        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            core::hint::spin_loop();
        }

        SpinlockGuard {
            lock: self,
            interrupts_were_enabled,
        }
    }

    /// Tenta adquirir sem bloquear.
    pub fn try_lock(&self) -> Option<SpinlockGuard<'_, T>> {
        let interrupts_were_enabled = crate::arch::Cpu::interrupts_enabled();
        crate::arch::Cpu::disable_interrupts();

        if self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            Some(SpinlockGuard {
                lock: self,
                interrupts_were_enabled,
            })
        } else {
            if interrupts_were_enabled {
                crate::arch::Cpu::enable_interrupts();
            }
            None
        }
    }
}

pub struct SpinlockGuard<'a, T> {
    lock: &'a Spinlock<T>,
    interrupts_were_enabled: bool,
}

impl<T> Deref for SpinlockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: posse exclusiva garantida pelo lock
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for SpinlockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: posse exclusiva garantida pelo lock
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for SpinlockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
        if self.interrupts_were_enabled {
            crate::arch::Cpu::enable_interrupts();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_basic() {
        let lock = Spinlock::new(41);
        {
            let mut g = lock.lock();
            *g += 1;
        }
        assert_eq!(*lock.lock(), 42);
    }

    #[test]
    fn test_try_lock_contended() {
        let lock = Spinlock::new(0u32);
        let g = lock.lock();
        assert!(lock.try_lock().is_none());
        drop(g);
        assert!(lock.try_lock().is_some());
    }
}
