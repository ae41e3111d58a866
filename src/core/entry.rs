//! Entry point lógico do kernel.
//!
//! `kernel_main` é o primeiro código Rust de alto nível depois do
//! trampolim em assembly do `_start`. Inicializa os subsistemas na
//! ordem estrita de dependência (folhas primeiro):
//!
//! serial/log -> GDT/TSS -> IDT -> memória (heap, PMM, PML4 do kernel)
//! -> PIC/PIT -> teclado -> armazenamento (ATA, cache, VFS) -> tasks ->
//! syscalls -> [self-tests] -> shell -> loop ocioso.

use crate::arch::traits::CpuOps;
use crate::arch::Cpu;
use crate::core::handoff::BootInfo;

/// Frequência do tick do scheduler (PIT, vetor 32).
const TIMER_HZ: u32 = 250;

/// Função principal do kernel. Não retorna.
#[no_mangle]
pub extern "C" fn kernel_main(boot_info: &'static BootInfo) -> ! {
    // 1. Serial primeiro: é o canal de diagnóstico de tudo que segue.
    crate::drivers::serial::init();

    crate::kinfo!("==============================");
    crate::kinfo!(" Cinder OS — kernel Ember v{}", env!("CARGO_PKG_VERSION"));
    crate::kinfo!("==============================");

    // 2. Sanidade do handoff. Sem framebuffer coerente não dá para
    // confiar no resto do registro de boot.
    if !boot_info.is_sane() {
        crate::kerror!("(Boot) boot info invalido; travando");
        Cpu::hang();
    }

    // 3. GDT/TSS e IDT antes de qualquer coisa que possa faltar página
    // ou disparar exceção.
    // SAFETY: uma única chamada, no boot
    unsafe {
        crate::arch::x86_64::gdt::init();
        crate::arch::x86_64::idt::init();
    }
    crate::kok!("CPU (GDT/TSS/IDT)");

    // 4. Memória: heap -> PMM -> PML4 própria com identity de 4 GiB.
    // SAFETY: ambiente de boot com identity map da UEFI ativo
    unsafe {
        crate::mm::init();
    }
    crate::kok!("Memoria (heap/PMM/paging)");

    // 5. Framebuffer + console de texto.
    crate::drivers::video::init(boot_info);
    crate::kok!("Video {}x{}", boot_info.horizontal_resolution, boot_info.vertical_resolution);

    // 6. Controladores de interrupção e timer (heartbeat do scheduler).
    crate::arch::x86_64::interrupts::init();
    crate::drivers::pic::init();
    let hz = crate::drivers::timer::init(TIMER_HZ);
    crate::kok!("PIC/PIT ({} Hz)", hz);

    // 7. Teclado PS/2.
    crate::drivers::keyboard::init();
    crate::kok!("Teclado");

    // 8. Armazenamento: ATA -> block cache -> VFS (FAT16).
    crate::fs::init();
    crate::kok!("Filesystem");

    // 9. Multitarefa: o contexto atual vira a task idle (tid 0).
    crate::sched::task::task_init();
    crate::kok!("Scheduler");

    // 10. Syscalls (MSRs da instrução `syscall`; o gate 128 já está na
    // IDT).
    crate::syscall::init();
    crate::kok!("Syscalls");

    // 11. Self-tests: depois de todos os inits, antes do shell.
    #[cfg(feature = "self_test")]
    run_self_tests();

    // 12. Shell e vida.
    crate::shell::init();
    Cpu::enable_interrupts();

    idle_loop();
}

/// Suites que precisam do kernel vivo (page tables e scheduler reais).
#[cfg(feature = "self_test")]
fn run_self_tests() {
    use crate::klib::test_framework::run_test_suite;

    run_test_suite("Paging", crate::mm::test::paging_test::PAGING_TESTS);
    run_test_suite("Scheduler", crate::sched::test::SCHED_TESTS);

    crate::kok!("Self-tests");
}

/// Loop ocioso da task idle (tid 0): drena a fila de eventos, alimenta
/// o shell, cede a vez e dorme até a próxima interrupção quando não há
/// nada a fazer.
fn idle_loop() -> ! {
    loop {
        let mut activity = false;

        if crate::arch::x86_64::interrupts::interrupt_dispatch_all() > 0 {
            activity = true;
        }

        if crate::shell::poll() {
            activity = true;
        }

        crate::sched::task_yield();

        if !activity {
            Cpu::halt();
        }
    }
}
