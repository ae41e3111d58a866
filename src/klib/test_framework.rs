//! Framework de self-tests do kernel.
//!
//! As propriedades que dependem de hardware real (page tables vivas,
//! troca de contexto) não rodam no harness do host; estas suítes são
//! executadas no boot, atrás da feature `self_test`, antes do shell.
//!
//! # Uso
//! ```ignore
//! run_test_suite("Paging", PAGING_TESTS);
//! ```

/// Resultado de um teste individual.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestResult {
    /// Teste passou.
    Pass,
    /// Teste falhou.
    Fail,
    /// Teste pulado (não aplicável no contexto atual).
    Skip,
}

/// Um caso de teste nomeado.
pub struct TestCase {
    pub name: &'static str,
    pub func: fn() -> TestResult,
}

impl TestCase {
    pub const fn new(name: &'static str, func: fn() -> TestResult) -> Self {
        Self { name, func }
    }

    /// Executa o teste e loga o resultado.
    pub fn run(&self) -> TestResult {
        let result = (self.func)();
        match result {
            TestResult::Pass => crate::kinfo!("[Test] ok   {}", self.name),
            TestResult::Fail => crate::kerror!("[Test] FAIL {}", self.name),
            TestResult::Skip => crate::kwarn!("[Test] skip {}", self.name),
        }
        result
    }
}

/// Executa uma suíte de testes.
///
/// Se algum teste falhar o kernel entra em panic — só prosseguimos para
/// o shell com todas as invariantes verificadas.
pub fn run_test_suite(suite_name: &str, tests: &[TestCase]) {
    crate::kinfo!("=== SUITE: {} ({} testes) ===", suite_name, tests.len());

    let mut passed = 0usize;
    let mut skipped = 0usize;

    let mut i = 0;
    while i < tests.len() {
        match tests[i].run() {
            TestResult::Pass => passed += 1,
            TestResult::Fail => {
                crate::kerror!("SUITE FALHOU: {}", suite_name);
                panic!("self-test failed");
            }
            TestResult::Skip => skipped += 1,
        }
        i += 1;
    }

    if skipped > 0 {
        crate::kinfo!("=== {}: {} ok, {} skip ===", suite_name, passed, skipped);
    } else {
        crate::kinfo!("=== {}: {} ok ===", suite_name, passed);
    }
}

/// Asserção para testes: loga e retorna `Fail` se a condição for falsa.
#[macro_export]
macro_rules! kassert {
    ($cond:expr) => {
        if !($cond) {
            $crate::kerror!("ASSERT FALHOU: {}", stringify!($cond));
            return $crate::klib::test_framework::TestResult::Fail;
        }
    };
    ($cond:expr, $msg:expr) => {
        if !($cond) {
            $crate::kerror!("ASSERT FALHOU: {}", $msg);
            return $crate::klib::test_framework::TestResult::Fail;
        }
    };
}

/// Asserção de igualdade.
#[macro_export]
macro_rules! kassert_eq {
    ($left:expr, $right:expr) => {
        if ($left) != ($right) {
            $crate::kerror!("ASSERT FALHOU: {} != {}", stringify!($left), stringify!($right));
            return $crate::klib::test_framework::TestResult::Fail;
        }
    };
}
