//! Heap do kernel — free list first-fit com canário e crescimento.
//!
//! Cada bloco carrega um cabeçalho `{size, tag, next}`; a área útil
//! termina num canário de 32 bits verificado no `kfree`. Invariantes:
//!
//! - a free list é ordenada por endereço;
//! - blocos livres adjacentes são coalescidos no `kfree`;
//! - o payload do usuário é alinhado a 8 bytes;
//! - canário divergente é logado com a tag do bloco mas NÃO aborta o
//!   free (o log é forense — o vizinho já foi corrompido de qualquer
//!   forma).
//!
//! O heap cresce sob demanda: quando nenhuma busca satisfaz o pedido,
//! um novo trecho (>= 1 MiB, alinhado a página) é anexado em
//! `heap_end` — memória identity-mapped logo após a região atual — e
//! fundido com o bloco final se contíguo. O campo `limit` é o teto
//! absoluto de crescimento.
//!
//! Também é aqui que mora o `GlobalAlloc` que serve `Box`/`Vec`/`Arc`:
//! alinhamentos <= 8 passam direto pelo `kmalloc`; maiores usam
//! over-alloc com o ponteiro original guardado uma palavra abaixo do
//! endereço alinhado.

use crate::sync::Spinlock;
use core::alloc::{GlobalAlloc, Layout};

/// Canário gravado em `payload_end - 4`.
pub const KMALLOC_CANARY: u32 = 0xDEAD_BEEF;

const ALIGN: u32 = 8;

/// Cabeçalho de bloco (16 bytes, alinhado a 8).
#[repr(C)]
struct BlockHeader {
    /// Tamanho TOTAL do bloco (cabeçalho incluso).
    size: u32,
    /// Tag de sequência da alocação (diagnóstico de canário).
    tag: u32,
    next: *mut BlockHeader,
}

const HEADER_SIZE: u32 = core::mem::size_of::<BlockHeader>() as u32;

#[inline]
const fn align_up(size: u32) -> u32 {
    (size + (ALIGN - 1)) & !(ALIGN - 1)
}

/// Estado do heap. Endereços crus sobre uma região identity-mapped
/// (no kernel) ou sobre um buffer do host (nos testes).
pub struct KernelHeap {
    free_list: *mut BlockHeader,
    heap_start: usize,
    heap_end: usize,
    /// Teto absoluto de expansão.
    limit: usize,
    alloc_seq: u32,
    canary_mismatches: u64,
}

// SAFETY: acesso serializado pelo Spinlock global
unsafe impl Send for KernelHeap {}

impl KernelHeap {
    pub const fn new() -> Self {
        Self {
            free_list: core::ptr::null_mut(),
            heap_start: 0,
            heap_end: 0,
            limit: 0,
            alloc_seq: 1,
            canary_mismatches: 0,
        }
    }

    /// Inicializa o heap sobre `[start, end)`, com crescimento até `limit`.
    ///
    /// # Safety
    /// A região precisa estar mapeada, gravável e exclusiva do heap.
    pub unsafe fn init(&mut self, start: usize, end: usize, limit: usize) {
        if end <= start || (end - start) < HEADER_SIZE as usize {
            return;
        }
        self.heap_start = start;
        self.heap_end = end;
        self.limit = limit;

        let first = start as *mut BlockHeader;
        (*first).size = (end - start) as u32;
        (*first).tag = 0;
        (*first).next = core::ptr::null_mut();
        self.free_list = first;
    }

    pub fn initialized(&self) -> bool {
        self.heap_end != 0
    }

    /// Tamanho total necessário para atender `size` bytes de usuário.
    fn total_size_for(size: u32) -> u32 {
        let wanted = align_up(size);
        // espaço para o canário no fim, com o total realinhado
        let wanted_with_canary = align_up(wanted + 4);
        wanted_with_canary + HEADER_SIZE
    }

    /// Busca first-fit. Retorna o ponteiro de usuário ou null.
    pub(crate) unsafe fn try_alloc(&mut self, size: u32) -> *mut u8 {
        if size == 0 || self.free_list.is_null() {
            return core::ptr::null_mut();
        }

        let total_size = Self::total_size_for(size);

        let mut prev: *mut BlockHeader = core::ptr::null_mut();
        let mut cur = self.free_list;

        while !cur.is_null() {
            // blocos de tamanho zero são lixo: remover e seguir
            if (*cur).size == 0 {
                crate::kwarn!("(Heap) bloco de tamanho zero em {:#x}, removendo", cur as usize);
                if prev.is_null() {
                    self.free_list = (*cur).next;
                } else {
                    (*prev).next = (*cur).next;
                }
                cur = (*cur).next;
                continue;
            }

            if (*cur).size >= total_size {
                // Dividir apenas se a sobra comporta cabeçalho + 2*ALIGN
                // bytes úteis; senão entregar o bloco inteiro.
                if (*cur).size >= total_size + HEADER_SIZE + ALIGN * 2 {
                    let rest = (cur as usize + total_size as usize) as *mut BlockHeader;
                    (*rest).size = (*cur).size - total_size;
                    (*rest).tag = 0;
                    (*rest).next = (*cur).next;
                    (*cur).size = total_size;
                    if prev.is_null() {
                        self.free_list = rest;
                    } else {
                        (*prev).next = rest;
                    }
                } else if prev.is_null() {
                    self.free_list = (*cur).next;
                } else {
                    (*prev).next = (*cur).next;
                }

                (*cur).tag = self.alloc_seq;
                self.alloc_seq = self.alloc_seq.wrapping_add(1);

                let user_ptr = (cur as usize + HEADER_SIZE as usize) as *mut u8;
                // canário no fim do BLOCO entregue (que pode ser maior
                // que o pedido quando a sobra não justificou divisão);
                // o kfree verifica nesta mesma posição
                let canary = (cur as usize + (*cur).size as usize - 4) as *mut u32;
                canary.write_unaligned(KMALLOC_CANARY);

                return user_ptr;
            }

            prev = cur;
            cur = (*cur).next;
        }

        core::ptr::null_mut()
    }

    /// Anexa `[start, start+size)` à free list (ordenado por endereço,
    /// fundindo com vizinhos contíguos).
    unsafe fn insert_region(&mut self, start: usize, size: u32) {
        let new_block = start as *mut BlockHeader;
        (*new_block).size = size;
        (*new_block).tag = 0;
        (*new_block).next = core::ptr::null_mut();
        self.insert_sorted_and_merge(new_block);
    }

    unsafe fn insert_sorted_and_merge(&mut self, hdr: *mut BlockHeader) {
        // inserir mantendo ordem de endereço
        if self.free_list.is_null() || hdr < self.free_list {
            (*hdr).next = self.free_list;
            self.free_list = hdr;
        } else {
            let mut cur = self.free_list;
            while !(*cur).next.is_null() && (*cur).next < hdr {
                cur = (*cur).next;
            }
            (*hdr).next = (*cur).next;
            (*cur).next = hdr;
        }

        // varredura de coalescência para frente
        let mut cur = self.free_list;
        while !cur.is_null() && !(*cur).next.is_null() {
            let cur_end = cur as usize + (*cur).size as usize;
            let next = (*cur).next;
            if cur_end == next as usize {
                (*cur).size += (*next).size;
                (*cur).next = (*next).next;
                // pode haver mais fusões a partir do mesmo bloco
            } else {
                cur = next;
            }
        }
    }

    /// Libera um ponteiro de usuário.
    pub(crate) unsafe fn free(&mut self, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }

        let hdr = (ptr as usize - HEADER_SIZE as usize) as *mut BlockHeader;

        // Sanidade mínima: abaixo do início do heap é lixo na certa.
        // (O teto não é confiável por causa do crescimento dinâmico.)
        if (hdr as usize) < self.heap_start {
            return;
        }

        // Verificação do canário: fica em user_end - 4
        if (*hdr).size > HEADER_SIZE + 4 {
            let user_bytes = (*hdr).size - HEADER_SIZE;
            let canary = (hdr as usize + HEADER_SIZE as usize + user_bytes as usize - 4) as *const u32;
            let got = canary.read_unaligned();
            if got != KMALLOC_CANARY {
                self.canary_mismatches += 1;
                crate::kerror!(
                    "(Heap) CANARIO DIVERGENTE ptr={:#x} size={} tag={} esperado={:#010x} lido={:#010x}",
                    ptr as usize,
                    (*hdr).size,
                    (*hdr).tag,
                    KMALLOC_CANARY,
                    got
                );
                // prosseguir mesmo assim: o log é forense
            }
        }

        self.insert_sorted_and_merge(hdr);
    }

    /// Expande o heap em pelo menos `additional` bytes (alinhado a
    /// página, mínimo 1 MiB). Retorna a faixa anexada para que o
    /// chamador reserve os frames correspondentes no PMM.
    pub(crate) unsafe fn expand(&mut self, additional: u32) -> Option<(usize, usize)> {
        if additional == 0 || self.heap_end == 0 {
            return None;
        }

        let mut grow = additional.max(0x10_0000); // 1 MiB mínimo
        grow = (grow + 0xFFF) & !0xFFF; // alinhar a página

        let start = self.heap_end;
        let end = start.checked_add(grow as usize)?;
        if end > self.limit {
            crate::kwarn!(
                "(Heap) expansão negada: end={:#x} excede limite {:#x}",
                end,
                self.limit
            );
            return None;
        }

        self.insert_region(start, grow);
        self.heap_end = end;

        crate::kdebug!("(Heap) expandido em {} bytes, novo fim={:#x}", grow, end);
        Some((start, end))
    }

    /// Existe bloco livre que comporte `size` bytes de usuário?
    pub(crate) fn has_space(&self, size: u32) -> bool {
        let wanted = align_up(size);
        let mut cur = self.free_list;
        unsafe {
            while !cur.is_null() {
                if (*cur).size >= wanted + HEADER_SIZE {
                    return true;
                }
                cur = (*cur).next;
            }
        }
        false
    }

    pub(crate) fn total_bytes(&self) -> u32 {
        if self.heap_end > self.heap_start {
            (self.heap_end - self.heap_start) as u32
        } else {
            0
        }
    }

    pub(crate) fn free_bytes(&self) -> u32 {
        let mut total = 0u32;
        let mut cur = self.free_list;
        unsafe {
            while !cur.is_null() {
                if (*cur).size > HEADER_SIZE {
                    total += (*cur).size - HEADER_SIZE;
                }
                cur = (*cur).next;
            }
        }
        total
    }

    pub(crate) fn largest_free_block(&self) -> u32 {
        let mut largest = 0u32;
        let mut cur = self.free_list;
        unsafe {
            while !cur.is_null() {
                if (*cur).size > HEADER_SIZE {
                    largest = largest.max((*cur).size - HEADER_SIZE);
                }
                cur = (*cur).next;
            }
        }
        largest
    }

    /// Quantidade de blocos na free list (para as invariantes de teste).
    pub(crate) fn free_block_count(&self) -> usize {
        let mut n = 0;
        let mut cur = self.free_list;
        unsafe {
            while !cur.is_null() {
                n += 1;
                cur = (*cur).next;
            }
        }
        n
    }

    pub(crate) fn canary_mismatches(&self) -> u64 {
        self.canary_mismatches
    }
}

/// Heap global do kernel.
pub static HEAP: Spinlock<KernelHeap> = Spinlock::new(KernelHeap::new());

/// Inicializa o heap global.
///
/// # Safety
/// Ver [`KernelHeap::init`]. Chamar uma única vez, antes de qualquer
/// alocação (`Box`/`Vec` inclusive).
pub unsafe fn init(start: usize, end: usize, limit: usize) {
    HEAP.lock().init(start, end, limit);
    crate::kinfo!(
        "(Heap) {:#x}..{:#x} (limite {:#x})",
        start,
        end,
        limit
    );
}

/// Aloca `size` bytes (alinhamento de 8). Retorna null em OOM.
///
/// Sem bloco que sirva: UMA expansão e UMA nova tentativa; se ainda
/// assim não couber, null.
pub fn kmalloc(size: u32) -> *mut u8 {
    let ptr = unsafe { HEAP.lock().try_alloc(size) };
    if !ptr.is_null() {
        return ptr;
    }

    let total = KernelHeap::total_size_for(size);
    let range = unsafe { HEAP.lock().expand(total) };
    match range {
        Some((start, end)) => {
            // reservar os frames físicos recém-anexados; fora do
            // lock do heap para não aninhar com o lock do PMM
            crate::mm::pmm::reserve(start as u64, end as u64);
        }
        None => return core::ptr::null_mut(),
    }

    // retry única depois da expansão
    let ptr = unsafe { HEAP.lock().try_alloc(size) };
    if ptr.is_null() {
        crate::kerror!("(Heap) kmalloc({}) falhou mesmo apos expansao", size);
    }
    ptr
}

/// Libera um ponteiro de `kmalloc`. Null é aceito.
pub fn kfree(ptr: *mut u8) {
    unsafe { HEAP.lock().free(ptr) }
}

/// Há um bloco contíguo livre para `size` bytes?
pub fn has_space(size: u32) -> bool {
    HEAP.lock().has_space(size)
}

pub fn heap_total_bytes() -> u32 {
    HEAP.lock().total_bytes()
}

pub fn heap_free_bytes() -> u32 {
    HEAP.lock().free_bytes()
}

pub fn heap_largest_free_block() -> u32 {
    HEAP.lock().largest_free_block()
}

pub fn heap_free_block_count() -> usize {
    HEAP.lock().free_block_count()
}

pub fn heap_canary_mismatches() -> u64 {
    HEAP.lock().canary_mismatches()
}

// =============================================================================
// GLOBAL ALLOCATOR (Box/Vec/Arc)
// =============================================================================

/// Adaptador do heap para a trait `GlobalAlloc` da crate `alloc`.
pub struct EmberAllocator;

unsafe impl GlobalAlloc for EmberAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let size = layout.size().max(1) as u32;
        if layout.align() <= ALIGN as usize {
            return kmalloc(size);
        }

        // Alinhamento maior que 8: over-alloc e guardar o ponteiro
        // original uma palavra abaixo do endereço alinhado.
        let extra = layout.align() + core::mem::size_of::<usize>();
        let raw = kmalloc(size + extra as u32);
        if raw.is_null() {
            return core::ptr::null_mut();
        }
        let aligned = (raw as usize + core::mem::size_of::<usize>() + layout.align() - 1)
            & !(layout.align() - 1);
        ((aligned - core::mem::size_of::<usize>()) as *mut usize).write(raw as usize);
        aligned as *mut u8
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        if ptr.is_null() {
            return;
        }
        if layout.align() <= ALIGN as usize {
            kfree(ptr);
        } else {
            let raw = ((ptr as usize - core::mem::size_of::<usize>()) as *const usize).read();
            kfree(raw as *mut u8);
        }
    }
}

#[cfg(not(test))]
#[global_allocator]
static ALLOCATOR: EmberAllocator = EmberAllocator;
