//! Gerenciamento de memória: PMM, heap, paginação e vmem.
//!
//! Ordem de dependência (folhas primeiro): heap -> PMM -> paginação.
//! O heap nasce sobre uma janela fixa identity-mapped (ver `config`)
//! para que o PMM possa alocar seus chunks de bitmap nele.

pub mod addr;
pub mod config;
pub mod error;
pub mod heap;
pub mod paging;
pub mod pmm;
pub mod test;
pub mod vmem;

pub use addr::{PhysAddr, VirtAddr};
pub use error::{MmError, MmResult};

/// Tipo de recurso para consultas de espaço.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemType {
    Heap,
    Frame,
}

/// Há espaço para `size` bytes no recurso indicado?
///
/// - `Heap`: existe um bloco livre contíguo que comporte `size`;
/// - `Frame`: existem `ceil(size/4096)` frames livres consecutivos.
pub fn mem_has_space(mem_type: MemType, size: u32) -> bool {
    match mem_type {
        MemType::Heap => heap::has_space(size),
        MemType::Frame => {
            let need = ((size as u64 + config::FRAME_SIZE - 1) / config::FRAME_SIZE).max(1);
            pmm::FRAME_ALLOCATOR.lock().has_contiguous(need)
        }
    }
}

/// Inicializa o subsistema de memória completo.
///
/// # Safety
/// Pressupõe o ambiente de boot: identity map da UEFI ativo e as faixas
/// de `config` livres para uso exclusivo do kernel.
pub unsafe fn init() {
    use config::*;

    heap::init(
        HEAP_PHYS_BASE,
        HEAP_PHYS_BASE + HEAP_INITIAL_SIZE,
        HEAP_PHYS_LIMIT,
    );

    pmm::init(PHYS_MANAGED_START, PHYS_MANAGED_END);

    // Frames que já têm dono: imagem do kernel e janela atual do heap.
    pmm::reserve(KERNEL_IMAGE_START, KERNEL_IMAGE_END);
    pmm::reserve(
        HEAP_PHYS_BASE as u64,
        (HEAP_PHYS_BASE + HEAP_INITIAL_SIZE) as u64,
    );

    if let Err(e) = paging::init_kernel_pml4() {
        crate::kerror!("(MM) init_kernel_pml4 falhou: {:?}", e);
    }
}

/// Estatísticas para o comando `mem` do shell.
pub fn print_stats() {
    crate::kprintln!("Heap:");
    crate::kprintln!("  total   : {} KiB", heap::heap_total_bytes() / 1024);
    crate::kprintln!("  livre   : {} KiB", heap::heap_free_bytes() / 1024);
    crate::kprintln!(
        "  maior bloco: {} KiB",
        heap::heap_largest_free_block() / 1024
    );
    crate::kprintln!("Frames fisicos:");
    crate::kprintln!("  gerenciados: {}", pmm::frames());
    crate::kprintln!("  em uso     : {}", pmm::used_frames());
}
