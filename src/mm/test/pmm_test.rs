//! Testes de host do alocador de frames.

use crate::mm::addr::PhysAddr;
use crate::mm::config::FRAME_SIZE;
use crate::mm::pmm::FrameBitmap;

fn make_pmm(frames: u64) -> FrameBitmap {
    let mut pmm = FrameBitmap::new();
    pmm.init(0x10_0000, 0x10_0000 + frames * FRAME_SIZE);
    pmm
}

#[test]
fn test_alloc_lowest_first() {
    let mut pmm = make_pmm(16);
    let a = pmm.alloc_frame().unwrap();
    let b = pmm.alloc_frame().unwrap();
    assert_eq!(a.as_u64(), 0x10_0000);
    assert_eq!(b.as_u64(), 0x10_0000 + FRAME_SIZE);
}

#[test]
fn test_bijection_bits_vs_allocations() {
    // Propriedade: número de bits setados == alocações pendentes,
    // para qualquer sequência de alloc/free.
    let mut pmm = make_pmm(64);
    let mut live = Vec::new();

    for round in 0..8 {
        for _ in 0..(8 + round) {
            if let Some(f) = pmm.alloc_frame() {
                live.push(f);
            }
        }
        // liberar metade
        for _ in 0..live.len() / 2 {
            let f = live.pop().unwrap();
            pmm.free_frame(f);
        }
        assert_eq!(pmm.set_bits(), live.len() as u64);
    }

    for f in live.drain(..) {
        pmm.free_frame(f);
    }
    assert_eq!(pmm.set_bits(), 0, "free(alloc()) == estado inicial");
}

#[test]
fn test_free_is_idempotent() {
    let mut pmm = make_pmm(8);
    let f = pmm.alloc_frame().unwrap();
    pmm.free_frame(f);
    pmm.free_frame(f); // segundo free é no-op
    assert_eq!(pmm.set_bits(), 0);
}

#[test]
fn test_free_unaligned_is_dropped() {
    let mut pmm = make_pmm(8);
    let f = pmm.alloc_frame().unwrap();
    pmm.free_frame(PhysAddr::new(f.as_u64() + 1)); // desalinhado: ignorado
    assert_eq!(pmm.set_bits(), 1);
}

#[test]
fn test_exhaustion_returns_none() {
    let mut pmm = make_pmm(4);
    for _ in 0..4 {
        assert!(pmm.alloc_frame().is_some());
    }
    assert!(pmm.alloc_frame().is_none(), "exaustão retorna None, nunca panica");
}

#[test]
fn test_freed_frame_is_reused() {
    let mut pmm = make_pmm(4);
    let frames: Vec<_> = (0..4).map(|_| pmm.alloc_frame().unwrap()).collect();
    pmm.free_frame(frames[1]);
    let again = pmm.alloc_frame().unwrap();
    assert_eq!(again, frames[1], "menor endereço livre vence");
}

#[test]
fn test_reserve_marks_range() {
    let mut pmm = make_pmm(16);
    // reservar a faixa do 4o ao 8o frame
    let start = 0x10_0000 + 4 * FRAME_SIZE;
    let end = 0x10_0000 + 8 * FRAME_SIZE;
    pmm.reserve(start, end);
    assert_eq!(pmm.set_bits(), 4);

    // reserva é idempotente
    pmm.reserve(start, end);
    assert_eq!(pmm.set_bits(), 4);

    // alocações pulam a área reservada
    for _ in 0..12 {
        let f = pmm.alloc_frame().unwrap();
        assert!(f.as_u64() < start || f.as_u64() >= end);
    }
    assert!(pmm.alloc_frame().is_none());
}

#[test]
fn test_reserve_partial_page_rounds_out() {
    let mut pmm = make_pmm(16);
    // tocar um byte no meio de um frame reserva o frame inteiro
    pmm.reserve(0x10_0000 + 100, 0x10_0000 + 101);
    assert_eq!(pmm.set_bits(), 1);
}

#[test]
fn test_reserve_out_of_range_is_ignored() {
    let mut pmm = make_pmm(8);
    pmm.reserve(0, 0x1000); // abaixo da faixa
    pmm.reserve(0x4000_0000, 0x4001_0000); // acima da faixa
    assert_eq!(pmm.set_bits(), 0);
}

#[test]
fn test_has_contiguous() {
    let mut pmm = make_pmm(8);
    assert!(pmm.has_contiguous(8));
    assert!(!pmm.has_contiguous(9));

    // fragmentar: ocupar o frame do meio
    let start = 0x10_0000 + 4 * FRAME_SIZE;
    pmm.reserve(start, start + FRAME_SIZE);
    assert!(pmm.has_contiguous(4));
    assert!(!pmm.has_contiguous(5));
}

#[test]
fn test_crosses_chunk_boundary() {
    // 1 MiB = 256 frames por chunk; 300 frames forçam 2 chunks
    let mut pmm = make_pmm(300);
    let mut last = None;
    for _ in 0..300 {
        let f = pmm.alloc_frame().expect("todos os 300 frames alocáveis");
        if let Some(prev) = last {
            assert_eq!(f.as_u64(), prev + FRAME_SIZE, "ordem estritamente crescente");
        }
        last = Some(f.as_u64());
    }
    assert!(pmm.alloc_frame().is_none());
    assert_eq!(pmm.set_bits(), 300);
}
