//! Stubs de interrupção em assembly + dispatch central.
//!
//! Cada stub empilha o número do vetor e um error code (o real, quando a
//! CPU fornece um; um zero falso caso contrário) e em seguida os GPRs na
//! ordem canônica do [`ContextFrame`]. Todos os caminhos — exceções,
//! IRQs, preempção e `int 0x80` — consomem o MESMO layout de frame.
//!
//! Fluxos:
//! - Exceções (0-31): diagnóstico via serial raw + halt (fatal).
//! - IRQs (32-47 via PIC, 48 via APIC timer): EOI + dispatch.
//! - Vetor do timer: tick, EOI e caminho de preempção (pode nunca
//!   retornar — a próxima task é retomada via `task_restore`).
//! - Vetor 128: syscall (`int 0x80`), único gate com DPL=3.

use super::idt::ContextFrame;
use super::ports::inb;
use crate::arch::traits::CpuOps;
use crate::sync::Spinlock;
use alloc::collections::VecDeque;

pub const PIC_BASE_VECTOR: u8 = 32;
pub const KEYBOARD_VECTOR: u8 = 33;
pub const APIC_TIMER_VECTOR: u8 = 48;
pub const SYSCALL_VECTOR: u8 = 128;

// ============================================================================
// STUBS (ASSEMBLY)
// ============================================================================

// Macro para stubs SEM código de erro da CPU (push 0 manual).
macro_rules! int_stub {
    ($name:ident, $vec:expr) => {
        #[unsafe(naked)]
        pub extern "C" fn $name() {
            core::arch::naked_asm!(
                "push 0", // error code falso para alinhar o frame
                "push {vec}",
                // Salvar GPRs (ordem inversa do ContextFrame)
                "push rbp",
                "push r15", "push r14", "push r13", "push r12",
                "push r11", "push r10", "push r9", "push r8",
                "push rdi", "push rsi", "push rdx", "push rcx", "push rbx", "push rax",
                "mov rdi, rsp", // arg 1: ponteiro para o frame
                "call {dispatch}",
                "pop rax", "pop rbx", "pop rcx", "pop rdx", "pop rsi", "pop rdi",
                "pop r8", "pop r9", "pop r10", "pop r11",
                "pop r12", "pop r13", "pop r14", "pop r15",
                "pop rbp",
                "add rsp, 16", // vetor + error code
                "iretq",
                vec = const $vec,
                dispatch = sym interrupt_dispatch,
            );
        }
    };
}

// Macro para exceções que JÁ empilham error code (ex: Page Fault).
// O error code da CPU já está na posição certa do frame; basta empilhar
// o vetor logo abaixo dele.
macro_rules! int_stub_err {
    ($name:ident, $vec:expr) => {
        #[unsafe(naked)]
        pub extern "C" fn $name() {
            core::arch::naked_asm!(
                "push {vec}",
                "push rbp",
                "push r15", "push r14", "push r13", "push r12",
                "push r11", "push r10", "push r9", "push r8",
                "push rdi", "push rsi", "push rdx", "push rcx", "push rbx", "push rax",
                "mov rdi, rsp",
                "call {dispatch}",
                "pop rax", "pop rbx", "pop rcx", "pop rdx", "pop rsi", "pop rdi",
                "pop r8", "pop r9", "pop r10", "pop r11",
                "pop r12", "pop r13", "pop r14", "pop r15",
                "pop rbp",
                "add rsp, 16",
                "iretq",
                vec = const $vec,
                dispatch = sym interrupt_dispatch,
            );
        }
    };
}

// --- Exceções sem error code ---
int_stub!(isr0, 0); // #DE divide error
int_stub!(isr1, 1); // #DB debug
int_stub!(isr2, 2); // NMI
int_stub!(isr3, 3); // #BP breakpoint
int_stub!(isr4, 4); // #OF overflow
int_stub!(isr5, 5); // #BR bound range
int_stub!(isr6, 6); // #UD invalid opcode
int_stub!(isr7, 7); // #NM device not available
int_stub!(isr9, 9);
int_stub!(isr16, 16); // #MF x87 FP
int_stub!(isr18, 18); // #MC machine check
int_stub!(isr19, 19); // #XM SIMD FP
int_stub!(isr20, 20); // #VE

// --- Exceções com error code ---
int_stub_err!(isr8, 8); // #DF double fault
int_stub_err!(isr10, 10); // #TS invalid TSS
int_stub_err!(isr11, 11); // #NP segment not present
int_stub_err!(isr12, 12); // #SS stack fault
int_stub_err!(isr13, 13); // #GP general protection
int_stub_err!(isr14, 14); // #PF page fault
int_stub_err!(isr17, 17); // #AC alignment check

// --- IRQs (PIC remapeado 32-47) ---
int_stub!(irq32, 32);
int_stub!(irq33, 33);
int_stub!(irq34, 34);
int_stub!(irq35, 35);
int_stub!(irq36, 36);
int_stub!(irq37, 37);
int_stub!(irq38, 38);
int_stub!(irq39, 39);
int_stub!(irq40, 40);
int_stub!(irq41, 41);
int_stub!(irq42, 42);
int_stub!(irq43, 43);
int_stub!(irq44, 44);
int_stub!(irq45, 45);
int_stub!(irq46, 46);
int_stub!(irq47, 47);

// --- APIC timer + syscall ---
int_stub!(irq48, 48);
int_stub!(isr128, 128);

/// Instala todos os gates na IDT. Chamado por `idt::init()`.
pub fn install_gates() {
    use super::idt::set_gate;

    set_gate(0, isr0, 0);
    set_gate(1, isr1, 0);
    set_gate(2, isr2, 0);
    set_gate(3, isr3, 0);
    set_gate(4, isr4, 0);
    set_gate(5, isr5, 0);
    set_gate(6, isr6, 0);
    set_gate(7, isr7, 0);
    set_gate(8, isr8, 0);
    set_gate(9, isr9, 0);
    set_gate(10, isr10, 0);
    set_gate(11, isr11, 0);
    set_gate(12, isr12, 0);
    set_gate(13, isr13, 0);
    set_gate(14, isr14, 0);
    set_gate(16, isr16, 0);
    set_gate(17, isr17, 0);
    set_gate(18, isr18, 0);
    set_gate(19, isr19, 0);
    set_gate(20, isr20, 0);

    set_gate(32, irq32, 0);
    set_gate(33, irq33, 0);
    set_gate(34, irq34, 0);
    set_gate(35, irq35, 0);
    set_gate(36, irq36, 0);
    set_gate(37, irq37, 0);
    set_gate(38, irq38, 0);
    set_gate(39, irq39, 0);
    set_gate(40, irq40, 0);
    set_gate(41, irq41, 0);
    set_gate(42, irq42, 0);
    set_gate(43, irq43, 0);
    set_gate(44, irq44, 0);
    set_gate(45, irq45, 0);
    set_gate(46, irq46, 0);
    set_gate(47, irq47, 0);

    set_gate(APIC_TIMER_VECTOR, irq48, 0);

    // Único gate acessível do Ring 3
    set_gate(SYSCALL_VECTOR, isr128, 3);
}

// ============================================================================
// DISPATCH CENTRAL
// ============================================================================

/// Ponto de entrada comum de todos os stubs.
#[no_mangle]
extern "C" fn interrupt_dispatch(frame: *mut ContextFrame) {
    // SAFETY: o stub acabou de construir o frame nesta stack
    let frame = unsafe { &mut *frame };
    let vec = frame.vector as u8;

    if (frame.vector as usize) < 32 {
        exception_handler(frame);
    } else if vec == SYSCALL_VECTOR {
        crate::syscall::dispatch::handle_trap(frame);
    } else {
        irq_handler(frame);
    }
}

/// Nome legível de cada exceção (diagnóstico).
fn exception_name(vec: u64) -> &'static str {
    match vec {
        0 => "DIVIDE ERROR",
        1 => "DEBUG",
        2 => "NMI",
        3 => "BREAKPOINT",
        4 => "OVERFLOW",
        5 => "BOUND RANGE",
        6 => "INVALID OPCODE",
        7 => "DEVICE NOT AVAILABLE",
        8 => "DOUBLE FAULT",
        10 => "INVALID TSS",
        11 => "SEGMENT NOT PRESENT",
        12 => "STACK FAULT",
        13 => "GENERAL PROTECTION",
        14 => "PAGE FAULT",
        16 => "X87 FP",
        17 => "ALIGNMENT CHECK",
        18 => "MACHINE CHECK",
        19 => "SIMD FP",
        _ => "EXCEPTION",
    }
}

/// Handler fatal de exceção.
///
/// IMPORTANTE: usa apenas escrita serial raw — formatação/heap podem
/// causar outra exceção em cascata se o estado estiver corrompido.
fn exception_handler(frame: &ContextFrame) -> ! {
    use crate::drivers::serial;

    serial::write_str_raw("\r\n[FATAL] ");
    serial::write_str_raw(exception_name(frame.vector));
    serial::write_str_raw(" vec=");
    serial::write_hex_raw(frame.vector);
    serial::write_str_raw(" err=");
    serial::write_hex_raw(frame.error_code);
    serial::write_newline_raw();

    serial::write_str_raw("  RIP=");
    serial::write_hex_raw(frame.rip);
    serial::write_str_raw(" RSP=");
    serial::write_hex_raw(frame.rsp);
    serial::write_str_raw(" CS=");
    serial::write_hex_raw(frame.cs);
    serial::write_newline_raw();

    if frame.vector == 14 {
        serial::write_str_raw("  CR2=");
        serial::write_hex_raw(super::cpu::read_cr2());
        serial::write_newline_raw();
    }

    // Sem kill de processo nesta release: a máquina para aqui.
    loop {
        unsafe {
            core::arch::asm!("cli; hlt", options(nomem, nostack));
        }
    }
}

/// Handler de IRQs de hardware.
fn irq_handler(frame: &mut ContextFrame) {
    let vec = frame.vector as u8;

    if crate::drivers::timer::is_timer_vector(vec) {
        crate::drivers::timer::handle_tick();
        // EOI ANTES da troca de contexto: o caminho de preempção retoma a
        // próxima task via task_restore e nunca volta por este stub.
        send_eoi(vec);
        crate::sched::scheduler::preempt_from_irq(frame);
        return;
    }

    if vec == KEYBOARD_VECTOR {
        let status = inb(0x64);
        if status & 0x01 != 0 {
            let sc = inb(0x60);
            crate::drivers::keyboard::handle_scancode(sc);
            interrupt_raise(((vec as u32) << 16) | sc as u32);
        }
        send_eoi(vec);
        return;
    }

    interrupt_raise((vec as u32) << 16);
    send_eoi(vec);
}

fn send_eoi(vec: u8) {
    if vec == APIC_TIMER_VECTOR {
        crate::drivers::timer::apic::eoi();
    } else if (PIC_BASE_VECTOR..PIC_BASE_VECTOR + 16).contains(&vec) {
        crate::drivers::pic::eoi(vec - PIC_BASE_VECTOR);
    }
}

// ============================================================================
// FILA DE EVENTOS (FIFO)
// ============================================================================
//
// IRQs não-críticas viram eventos `(vetor << 16) | payload` drenados em
// ordem FIFO pelo loop ocioso via `interrupt_dispatch_one/all`.

const EVENT_QUEUE_CAP: usize = 64;

static EVENTS: Spinlock<VecDeque<u32>> = Spinlock::new(VecDeque::new());
static DROPPED: core::sync::atomic::AtomicU64 = core::sync::atomic::AtomicU64::new(0);

/// Handlers de evento por vetor (32..=255 mapeado em 224 slots).
static EVENT_HANDLERS: Spinlock<[Option<fn(u32)>; 224]> = Spinlock::new([None; 224]);

/// Pré-aloca a fila para evitar alocação dentro de contexto de IRQ.
pub fn init() {
    EVENTS.lock().reserve(EVENT_QUEUE_CAP);
}

/// Registra um handler de evento para um vetor (>= 32).
pub fn register_event_handler(vec: u8, handler: fn(u32)) {
    if vec >= 32 {
        EVENT_HANDLERS.lock()[vec as usize - 32] = Some(handler);
    }
}

/// Enfileira um evento vindo de contexto de IRQ.
pub fn interrupt_raise(code: u32) {
    let mut q = EVENTS.lock();
    if q.len() >= EVENT_QUEUE_CAP {
        DROPPED.fetch_add(1, core::sync::atomic::Ordering::Relaxed);
        return;
    }
    q.push_back(code);
}

/// Drena e despacha UM evento. Retorna `true` se havia evento.
pub fn interrupt_dispatch_one() -> bool {
    let code = match EVENTS.lock().pop_front() {
        Some(c) => c,
        None => return false,
    };
    let vec = (code >> 16) as usize;
    let handler = if (32..256).contains(&vec) {
        EVENT_HANDLERS.lock()[vec - 32]
    } else {
        None
    };
    if let Some(h) = handler {
        h(code & 0xFFFF);
    }
    true
}

/// Drena todos os eventos pendentes. Retorna quantos foram despachados.
pub fn interrupt_dispatch_all() -> usize {
    let mut n = 0;
    while interrupt_dispatch_one() {
        n += 1;
    }
    n
}

/// Seção crítica simples: executa `f` com interrupções desabilitadas,
/// restaurando IF ao final. Num kernel single-CPU este é o único
/// primitivo de exclusão realmente necessário.
pub fn critical_section<T>(f: impl FnOnce() -> T) -> T {
    let was_enabled = crate::arch::Cpu::interrupts_enabled();
    crate::arch::Cpu::disable_interrupts();
    let r = f();
    if was_enabled {
        crate::arch::Cpu::enable_interrupts();
    }
    r
}
