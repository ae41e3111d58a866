//! Global Descriptor Table (GDT) + Task State Segment (TSS).
//!
//! Mesmo em 64-bit (Long Mode), a GDT é necessária para:
//! 1. Definir segmentos de Código/Dados (Kernel vs User).
//! 2. Carregar o TSS para troca de stack (RSP0) em interrupções vindas
//!    do Ring 3.
//!
//! # Layout dos seletores
//!
//! | Seletor | Descritor              |
//! |---------|------------------------|
//! | 0x00    | NULL                   |
//! | 0x08    | Kernel Code (64-bit)   |
//! | 0x10    | Kernel Data            |
//! | 0x18    | User Code 32-bit       |
//! | 0x20    | User Data              |
//! | 0x28    | User Code 64-bit       |
//! | 0x30    | TSS (ocupa 2 slots)    |
//!
//! O descritor de código 32-bit em 0x18 existe apenas para satisfazer o
//! layout exigido pela STAR/SYSRET: `SYSRET` 64-bit carrega CS = base+16
//! e SS = base+8, logo com base 0x18 obtemos CS=0x2B e SS=0x23.

use core::arch::asm;
use core::mem::size_of;

/// Seletores públicos (com RPL já embutido onde aplicável).
pub const KERNEL_CS: u16 = 0x08;
pub const KERNEL_DS: u16 = 0x10;
pub const USER_CS32: u16 = 0x18 | 3;
pub const USER_DS: u16 = 0x20 | 3;
pub const USER_CS64: u16 = 0x28 | 3;
pub const TSS_SEL: u16 = 0x30;

/// Estrutura de entrada da GDT (8 bytes).
#[repr(C, packed)]
#[derive(Clone, Copy)]
struct GdtEntry {
    limit_low: u16,
    base_low: u16,
    base_mid: u8,
    access: u8,
    granularity: u8,
    base_high: u8,
}

impl GdtEntry {
    /// Cria uma entrada nula (obrigatória).
    const fn null() -> Self {
        Self {
            limit_low: 0,
            base_low: 0,
            base_mid: 0,
            access: 0,
            granularity: 0,
            base_high: 0,
        }
    }

    /// Cria um segmento de código/dados. Em 64-bit os limites são
    /// ignorados para a maioria dos segmentos, mas o segmento 32-bit
    /// mantém limite cheio por compatibilidade.
    const fn new(access: u8, flags: u8) -> Self {
        Self {
            limit_low: 0xFFFF,
            base_low: 0,
            base_mid: 0,
            access,
            granularity: flags | 0x0F,
            base_high: 0,
        }
    }
}

// Flags de Acesso
const ACCESS_PRESENT: u8 = 0x80;
const ACCESS_DESCRIPTOR: u8 = 0x10; // 1 = Código/Dados, 0 = Sistema
const ACCESS_EXECUTABLE: u8 = 0x08;
const ACCESS_RW: u8 = 0x02; // Leitura p/ código, Escrita p/ dados
const ACCESS_PRIV_USER: u8 = 0x60;

// Flags de Granularidade
const FLAG_LONG_MODE: u8 = 0x20;
const FLAG_32BIT: u8 = 0x40;
const FLAG_GRANULAR: u8 = 0x80;

/// Task State Segment (formato 64-bit, 104 bytes).
#[repr(C, packed)]
struct Tss {
    _reserved0: u32,
    rsp0: u64,
    rsp1: u64,
    rsp2: u64,
    _reserved1: u64,
    ist: [u64; 7],
    _reserved2: u64,
    _reserved3: u16,
    iopb_offset: u16,
}

static mut TSS: Tss = Tss {
    _reserved0: 0,
    rsp0: 0,
    rsp1: 0,
    rsp2: 0,
    _reserved1: 0,
    ist: [0; 7],
    _reserved2: 0,
    _reserved3: 0,
    iopb_offset: size_of::<Tss>() as u16,
};

/// GDT completa: 6 descritores normais + TSS (2 slots).
#[repr(C, align(4096))]
struct Gdt {
    null: GdtEntry,
    kernel_code: GdtEntry,
    kernel_data: GdtEntry,
    user_code32: GdtEntry,
    user_data: GdtEntry,
    user_code64: GdtEntry,
    tss_low: GdtEntry,
    tss_high: GdtEntry,
}

static mut GDT: Gdt = Gdt {
    null: GdtEntry::null(),
    // 0x08: Kernel Code 64-bit
    kernel_code: GdtEntry::new(
        ACCESS_PRESENT | ACCESS_DESCRIPTOR | ACCESS_EXECUTABLE | ACCESS_RW,
        FLAG_LONG_MODE,
    ),
    // 0x10: Kernel Data
    kernel_data: GdtEntry::new(ACCESS_PRESENT | ACCESS_DESCRIPTOR | ACCESS_RW, 0),
    // 0x18: User Code 32-bit (apenas para o layout STAR/SYSRET)
    user_code32: GdtEntry::new(
        ACCESS_PRESENT | ACCESS_DESCRIPTOR | ACCESS_EXECUTABLE | ACCESS_RW | ACCESS_PRIV_USER,
        FLAG_32BIT | FLAG_GRANULAR,
    ),
    // 0x20: User Data
    user_data: GdtEntry::new(
        ACCESS_PRESENT | ACCESS_DESCRIPTOR | ACCESS_RW | ACCESS_PRIV_USER,
        0,
    ),
    // 0x28: User Code 64-bit
    user_code64: GdtEntry::new(
        ACCESS_PRESENT | ACCESS_DESCRIPTOR | ACCESS_EXECUTABLE | ACCESS_RW | ACCESS_PRIV_USER,
        FLAG_LONG_MODE,
    ),
    // 0x30: TSS — preenchido em runtime (base depende do endereço)
    tss_low: GdtEntry::null(),
    tss_high: GdtEntry::null(),
};

#[repr(C, packed)]
struct GdtDescriptor {
    limit: u16,
    base: u64,
}

/// Carrega a GDT, recarrega os registradores de segmento e o TR.
///
/// # Safety
/// Mexe com estado global da CPU. Deve ser chamado apenas uma vez no boot.
pub unsafe fn init() {
    let tss_base = core::ptr::addr_of!(TSS) as u64;
    let tss_limit = (size_of::<Tss>() - 1) as u64;

    // Descritor de sistema de 16 bytes para o TSS
    let gdt = core::ptr::addr_of_mut!(GDT);
    (*gdt).tss_low = GdtEntry {
        limit_low: tss_limit as u16,
        base_low: tss_base as u16,
        base_mid: (tss_base >> 16) as u8,
        access: 0x89, // Present, 64-bit TSS (available)
        granularity: ((tss_limit >> 16) & 0x0F) as u8,
        base_high: (tss_base >> 24) as u8,
    };
    (*gdt).tss_high = GdtEntry {
        limit_low: (tss_base >> 32) as u16,
        base_low: (tss_base >> 48) as u16,
        base_mid: 0,
        access: 0,
        granularity: 0,
        base_high: 0,
    };

    let gdt_ptr = GdtDescriptor {
        limit: (size_of::<Gdt>() - 1) as u16,
        base: gdt as u64,
    };

    asm!("lgdt [{}]", in(reg) &gdt_ptr, options(readonly, nostack, preserves_flags));

    // Recarregar segmentos: CS precisa de um far return, os demais
    // recebem o seletor de dados do kernel.
    asm!(
        "mov ax, 0x10",
        "mov ds, ax",
        "mov es, ax",
        "mov fs, ax",
        "mov gs, ax",
        "mov ss, ax",
        "push 0x08",
        "lea {tmp}, [rip + 2f]",
        "push {tmp}",
        "retfq",
        "2:",
        tmp = lateout(reg) _,
        out("ax") _,
    );

    // Carregar o Task Register
    asm!("ltr {0:x}", in(reg) TSS_SEL, options(nostack, preserves_flags));
}

/// Atualiza `TSS.rsp0` — a stack usada quando uma interrupção chega em
/// Ring 3. Deve ser chamado antes de toda entrada em modo usuário.
pub fn set_kernel_stack(rsp0: u64) {
    unsafe {
        core::ptr::write_volatile(core::ptr::addr_of_mut!(TSS.rsp0), rsp0);
    }
}
