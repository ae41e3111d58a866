//! Interrupt Descriptor Table (IDT).
//!
//! A IDT contém 256 gates. Vetores 0-31 são exceções da CPU, 32-47 é a
//! faixa do PIC remapeado, 48 é o timer APIC e 128 (`int 0x80`) é a
//! entrada de syscall — o único gate com DPL=3.

use core::mem::size_of;

/// Frame de contexto salvo pelos stubs de interrupção.
///
/// O layout é fixado UMA vez e consumido por todos os consumidores
/// (dispatcher de exceções, preempção, dispatcher de syscall). Os stubs
/// empilham vetor + error code (real ou falso) e os GPRs exatamente na
/// ordem inversa dos campos; acima ficam os cinco valores que a CPU
/// empilha no `iretq` frame.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ContextFrame {
    pub rax: u64,
    pub rbx: u64,
    pub rcx: u64,
    pub rdx: u64,
    pub rsi: u64,
    pub rdi: u64,
    pub r8: u64,
    pub r9: u64,
    pub r10: u64,
    pub r11: u64,
    pub r12: u64,
    pub r13: u64,
    pub r14: u64,
    pub r15: u64,
    pub rbp: u64,
    pub vector: u64,
    pub error_code: u64,
    // --- empilhado pela CPU ---
    pub rip: u64,
    pub cs: u64,
    pub rflags: u64,
    pub rsp: u64,
    pub ss: u64,
}

/// Entrada da IDT (Gate Descriptor, 16 bytes).
#[derive(Debug, Clone, Copy)]
#[repr(C, packed)]
pub struct IdtEntry {
    offset_low: u16,
    selector: u16,
    ist: u8,
    flags: u8,
    offset_mid: u16,
    offset_high: u32,
    reserved: u32,
}

impl IdtEntry {
    pub const fn missing() -> Self {
        Self {
            offset_low: 0,
            selector: 0,
            ist: 0,
            flags: 0,
            offset_mid: 0,
            offset_high: 0,
            reserved: 0,
        }
    }

    fn new(handler: u64, dpl: u8) -> Self {
        Self {
            offset_low: handler as u16,
            selector: super::gdt::KERNEL_CS,
            ist: 0,
            // Present | Interrupt Gate (0xE) | DPL
            flags: 0x8E | ((dpl & 3) << 5),
            offset_mid: (handler >> 16) as u16,
            offset_high: (handler >> 32) as u32,
            reserved: 0,
        }
    }
}

/// A IDT contém 256 entradas.
#[repr(C, align(16))]
pub struct Idt {
    pub entries: [IdtEntry; 256],
}

impl Idt {
    pub const fn new() -> Self {
        Self {
            entries: [IdtEntry::missing(); 256],
        }
    }
}

static mut IDT: Idt = Idt::new();

#[repr(C, packed)]
struct IdtDescriptor {
    limit: u16,
    base: u64,
}

/// Instala um gate. `dpl=3` apenas para o vetor de syscall.
pub fn set_gate(vector: u8, handler: extern "C" fn(), dpl: u8) {
    unsafe {
        let idt = core::ptr::addr_of_mut!(IDT);
        (*idt).entries[vector as usize] = IdtEntry::new(handler as usize as u64, dpl);
    }
}

/// Constrói a IDT completa e a carrega com `lidt`.
///
/// # Safety
/// Deve ser chamado uma única vez no boot, após a GDT.
pub unsafe fn init() {
    super::interrupts::install_gates();

    let idt_ptr = IdtDescriptor {
        limit: (size_of::<Idt>() - 1) as u16,
        base: core::ptr::addr_of!(IDT) as u64,
    };
    core::arch::asm!(
        "lidt [{}]",
        in(reg) &idt_ptr,
        options(readonly, nostack, preserves_flags)
    );
}
