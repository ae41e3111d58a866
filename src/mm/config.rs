//! Configuração do subsistema de memória.
//!
//! Layout físico (identity-mapped):
//!
//! | Região            | Uso                                     |
//! |-------------------|-----------------------------------------|
//! | 0x0000_0000..1MB  | Legado/BIOS/bootloader (não gerenciado) |
//! | 1MB..16MB         | Imagem do kernel + estruturas de boot   |
//! | 16MB..64MB        | Janela do heap do kernel (crescível)    |
//! | 1MB..128MB        | Faixa gerenciada pelo PMM               |
//!
//! O baixo 4 GiB inteiro é identity-mapped com large pages de 2 MiB
//! (ver `paging::init_kernel_pml4`), então todo frame gerenciado é
//! endereçável diretamente pelo kernel.

// =============================================================================
// TAMANHOS
// =============================================================================

/// Tamanho de uma página (4 KiB)
pub const PAGE_SIZE: usize = 4096;

/// Tamanho de um frame físico (== página)
pub const FRAME_SIZE: u64 = 4096;

/// Tamanho de uma large page (2 MiB)
pub const HUGE_PAGE_SIZE: u64 = 2 * 1024 * 1024;

// =============================================================================
// FAIXAS FÍSICAS
// =============================================================================

/// Início da faixa física gerenciada pelo PMM (1 MiB).
pub const PHYS_MANAGED_START: u64 = 0x10_0000;

/// Fim da faixa física gerenciada pelo PMM (128 MiB).
pub const PHYS_MANAGED_END: u64 = 0x800_0000;

/// Região reservada para a imagem do kernel + dados de boot.
pub const KERNEL_IMAGE_START: u64 = 0x10_0000;
pub const KERNEL_IMAGE_END: u64 = 0x100_0000;

/// Base física (== virtual, identity) do heap do kernel.
pub const HEAP_PHYS_BASE: usize = 0x100_0000; // 16 MiB

/// Tamanho inicial do heap (2 MiB).
pub const HEAP_INITIAL_SIZE: usize = 0x20_0000;

/// Limite máximo de crescimento do heap (64 MiB absoluto).
pub const HEAP_PHYS_LIMIT: usize = 0x400_0000;

// =============================================================================
// LAYOUT DO USERSPACE
// =============================================================================

/// Base do heap de usuário (`sbrk`).
pub const USER_HEAP_BASE: u64 = 0x4000_0000;

/// Base da stack de usuário (4 páginas mapeadas até 0x7FFFF000).
pub const USER_STACK_BASE: u64 = 0x7FFF_B000;

/// Tamanho da stack de usuário (16 KiB = 4 páginas).
pub const USER_STACK_SIZE: u64 = 0x4000;

/// Tamanho da stack de kernel por task (1 frame).
pub const KERNEL_STACK_SIZE: u64 = FRAME_SIZE;

// =============================================================================
// FLAGS DE PAGE TABLE (x86-64)
// =============================================================================

/// Máscara para extrair o endereço físico de uma entrada (bits 12-51).
pub const PAGE_ADDR_MASK: u64 = 0x000F_FFFF_FFFF_F000;

/// Máscara da base de uma large page de 2 MiB.
pub const HUGE_PAGE_ADDR_MASK: u64 = 0xFFFF_FFFF_FFE0_0000;

pub const PAGE_PRESENT: u64 = 1 << 0;
pub const PAGE_WRITABLE: u64 = 1 << 1;
pub const PAGE_USER: u64 = 1 << 2;
pub const PAGE_HUGE: u64 = 1 << 7;
pub const PAGE_NO_EXEC: u64 = 1 << 63;
