//! Handler de pânico do kernel.
//!
//! Escreve o diagnóstico via serial "raw" (sem formatação que dependa de
//! heap/locks, pois o estado pode estar corrompido) e trava a CPU.

use core::panic::PanicInfo;

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    crate::drivers::serial::write_str_raw("\r\n[PANIC] kernel panic");

    if let Some(loc) = info.location() {
        crate::drivers::serial::write_str_raw(" em ");
        crate::drivers::serial::write_str_raw(loc.file());
        crate::drivers::serial::write_str_raw(":");
        crate::drivers::serial::write_dec_raw(loc.line() as u64);
    }
    crate::drivers::serial::write_newline_raw();

    // Tentar imprimir a mensagem com o logger normal; se o lock da serial
    // estiver tomado o try_lock interno simplesmente desiste.
    crate::kerror!("PANIC: {}", info.message());

    loop {
        unsafe {
            core::arch::asm!("cli; hlt", options(nomem, nostack));
        }
    }
}
