//! Suíte in-kernel de paginação.
//!
//! Estas propriedades precisam de frames físicos e page tables reais,
//! então rodam no boot (feature `self_test`), nunca no host.

use crate::klib::test_framework::{TestCase, TestResult};
use crate::mm::config::{FRAME_SIZE, HUGE_PAGE_SIZE, PAGE_PRESENT, PAGE_USER, PAGE_WRITABLE};
use crate::mm::paging::{self, MapFlags};
use crate::mm::pmm;
use crate::{kassert, kassert_eq};

pub const PAGING_TESTS: &[TestCase] = &[
    TestCase::new("paging_map_roundtrip", test_map_roundtrip),
    TestCase::new("paging_flags_preserved", test_flags_preserved),
    TestCase::new("paging_large_page_split", test_large_page_split),
    TestCase::new("paging_unmap", test_unmap),
    TestCase::new("paging_user_pml4_layout", test_user_pml4_layout),
];

/// VA de teste bem longe de tudo que o kernel usa (PML4[1]).
const TEST_VA: u64 = 0x80_0000_0000 + 0x42000;

/// map_page_64 seguido de translate devolve o físico e as flags.
fn test_map_roundtrip() -> TestResult {
    let pml4 = match paging::create_user_pml4() {
        Some(p) => p,
        None => return TestResult::Fail,
    };
    let frame = match pmm::alloc_frame() {
        Some(f) => f,
        None => return TestResult::Fail,
    };

    let flags = MapFlags::PRESENT | MapFlags::WRITABLE | MapFlags::USER;
    kassert!(paging::map_page_64(pml4, frame.as_u64(), TEST_VA, flags).is_ok());

    let (phys, pte_flags) = match paging::translate(pml4, TEST_VA) {
        Some(t) => t,
        None => return TestResult::Fail,
    };
    kassert_eq!(phys, frame.as_u64());
    kassert!(pte_flags & PAGE_PRESENT != 0);
    kassert!(pte_flags & PAGE_WRITABLE != 0);
    kassert!(pte_flags & PAGE_USER != 0);

    TestResult::Pass
}

/// Mapeamento somente-leitura não ganha WRITABLE na PTE final.
fn test_flags_preserved() -> TestResult {
    let pml4 = match paging::create_user_pml4() {
        Some(p) => p,
        None => return TestResult::Fail,
    };
    let frame = match pmm::alloc_frame() {
        Some(f) => f,
        None => return TestResult::Fail,
    };

    let flags = MapFlags::PRESENT | MapFlags::USER;
    kassert!(paging::map_page_64(pml4, frame.as_u64(), TEST_VA + 0x1000, flags).is_ok());

    let (_, pte_flags) = match paging::translate(pml4, TEST_VA + 0x1000) {
        Some(t) => t,
        None => return TestResult::Fail,
    };
    kassert!(pte_flags & PAGE_WRITABLE == 0);
    kassert!(pte_flags & PAGE_USER != 0);

    TestResult::Pass
}

/// Mapear 4 KiB de usuário sobre uma região identity de 2 MiB divide a
/// large page e as outras 511 janelas continuam resolvendo para os
/// mesmos bytes físicos.
fn test_large_page_split() -> TestResult {
    let pml4 = match paging::create_user_pml4() {
        Some(p) => p,
        None => return TestResult::Fail,
    };

    // Região identity de 2 MiB FORA da faixa gerenciada pelo PMM: o
    // split muda o mapeamento de uma janela, e as tabelas baixas são
    // compartilhadas via PML4[0] — não podemos desviar um frame que o
    // alocador ainda possa entregar.
    let region: u64 = 0x1000_0000; // 256 MiB, alinhado a 2 MiB
    kassert_eq!(region % HUGE_PAGE_SIZE, 0);

    // antes do split: resolve por large page, virt == phys
    match paging::translate(pml4, region + 0x5000) {
        Some((phys, _)) => kassert_eq!(phys, region + 0x5000),
        None => return TestResult::Fail,
    }

    let frame = match pmm::alloc_frame() {
        Some(f) => f,
        None => return TestResult::Fail,
    };
    let target = region + 17 * FRAME_SIZE;
    let flags = MapFlags::PRESENT | MapFlags::WRITABLE | MapFlags::USER;
    kassert!(paging::map_page_64(pml4, frame.as_u64(), target, flags).is_ok());

    // a janela mapeada aponta para o frame novo
    match paging::translate(pml4, target) {
        Some((phys, _)) => kassert_eq!(phys, frame.as_u64()),
        None => return TestResult::Fail,
    }

    // todas as outras 511 janelas preservam a identidade
    for i in 0..512u64 {
        if i == 17 {
            continue;
        }
        let va = region + i * FRAME_SIZE;
        match paging::translate(pml4, va) {
            Some((phys, _)) => kassert_eq!(phys, va),
            None => return TestResult::Fail,
        }
    }

    TestResult::Pass
}

/// unmap devolve o físico e a tradução passa a falhar.
fn test_unmap() -> TestResult {
    let pml4 = match paging::create_user_pml4() {
        Some(p) => p,
        None => return TestResult::Fail,
    };
    let frame = match pmm::alloc_frame() {
        Some(f) => f,
        None => return TestResult::Fail,
    };

    let va = TEST_VA + 0x10000;
    let flags = MapFlags::PRESENT | MapFlags::WRITABLE | MapFlags::USER;
    kassert!(paging::map_page_64(pml4, frame.as_u64(), va, flags).is_ok());

    match paging::unmap_page_64(pml4, va) {
        Ok(phys) => kassert_eq!(phys.as_u64(), frame.as_u64()),
        Err(_) => return TestResult::Fail,
    }
    kassert!(paging::translate(pml4, va).is_none());

    TestResult::Pass
}

/// Layout da PML4 de usuário: [0] clonada, [1..256) zeradas,
/// [256..512) iguais às do kernel.
fn test_user_pml4_layout() -> TestResult {
    let kernel = paging::kernel_pml4();
    kassert!(kernel != 0);

    let user = match paging::create_user_pml4() {
        Some(p) => p,
        None => return TestResult::Fail,
    };

    let kptr = kernel as *const u64;
    let uptr = user as *const u64;

    // SAFETY: ambas as tabelas estão no identity map
    unsafe {
        kassert_eq!(uptr.read_volatile(), kptr.read_volatile());
        for i in 1..256 {
            kassert_eq!(uptr.add(i).read_volatile(), 0);
        }
        for i in 256..512 {
            kassert_eq!(uptr.add(i).read_volatile(), kptr.add(i).read_volatile());
        }
    }

    TestResult::Pass
}
