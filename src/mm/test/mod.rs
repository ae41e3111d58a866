//! Testes do subsistema de memória.
//!
//! - `paging_test`: suíte in-kernel (precisa de page tables reais),
//!   executada no boot atrás da feature `self_test`;
//! - `pmm_test`/`heap_test`: testes de host sobre instâncias locais.

pub mod paging_test;

#[cfg(test)]
mod heap_test;
#[cfg(test)]
mod pmm_test;
