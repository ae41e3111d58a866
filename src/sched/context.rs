//! Contexto de registradores e as rotinas de troca em assembly.
//!
//! Três entradas:
//! - `task_switch(old, new)`: caminho cooperativo — salva o estado
//!   callee-visible do chamador em `old` e cai no restore de `new`;
//! - `task_restore(new)`: restaura TUDO de `new` (CR3 só se mudou,
//!   RFLAGS, GPRs, stack) e salta para o RIP salvo — usado pelo caminho
//!   de preempção, que não pode voltar pelo stub de IRQ de outra task;
//! - `task_enter_usermode(entry, rsp, cr3)`: primeira entrada em Ring 3
//!   via `iretq` com SS=0x23/CS=0x2B.

/// Contexto completo de uma task.
///
/// ATENÇÃO: layout consumido pelo assembly abaixo — os offsets estão
/// documentados campo a campo e verificados por teste.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Registers {
    pub rax: u64,    // 0x00
    pub rbx: u64,    // 0x08
    pub rcx: u64,    // 0x10
    pub rdx: u64,    // 0x18
    pub rsi: u64,    // 0x20
    pub rdi: u64,    // 0x28
    pub rbp: u64,    // 0x30
    pub rsp: u64,    // 0x38
    pub r8: u64,     // 0x40
    pub r9: u64,     // 0x48
    pub r10: u64,    // 0x50
    pub r11: u64,    // 0x58
    pub r12: u64,    // 0x60
    pub r13: u64,    // 0x68
    pub r14: u64,    // 0x70
    pub r15: u64,    // 0x78
    pub rip: u64,    // 0x80
    pub rflags: u64, // 0x88
    pub cr3: u64,    // 0x90
}

impl Registers {
    /// Contexto zerado com IF habilitado no RFLAGS.
    pub const fn new() -> Self {
        Self {
            rax: 0,
            rbx: 0,
            rcx: 0,
            rdx: 0,
            rsi: 0,
            rdi: 0,
            rbp: 0,
            rsp: 0,
            r8: 0,
            r9: 0,
            r10: 0,
            r11: 0,
            r12: 0,
            r13: 0,
            r14: 0,
            r15: 0,
            rip: 0,
            rflags: 0x202, // IF=1
            cr3: 0,
        }
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

core::arch::global_asm!(
    r#"
// void task_switch(Registers *old /*rdi*/, const Registers *new /*rsi*/)
//
// Salva o estado que o call site cooperativo enxerga (callee-saved +
// rsp/rip/rflags/cr3) e restaura o contexto COMPLETO do destino.
.global task_switch
task_switch:
    mov [rdi + 0x08], rbx
    mov [rdi + 0x30], rbp
    mov [rdi + 0x60], r12
    mov [rdi + 0x68], r13
    mov [rdi + 0x70], r14
    mov [rdi + 0x78], r15

    // RSP de depois do retorno e o endereço de retorno como RIP
    lea rax, [rsp + 8]
    mov [rdi + 0x38], rax
    mov rax, [rsp]
    mov [rdi + 0x80], rax

    pushfq
    pop rax
    mov [rdi + 0x88], rax

    mov rax, cr3
    mov [rdi + 0x90], rax

    mov rdi, rsi
    // cai em task_restore com rdi = new

// void task_restore(const Registers *regs /*rdi*/) -> !
.global task_restore
task_restore:
    // CR3: pular a escrita se for o mesmo espaço (evita flush de TLB)
    mov rax, [rdi + 0x90]
    test rax, rax
    jz 2f
    mov rcx, cr3
    cmp rax, rcx
    je 2f
    mov cr3, rax
2:
    // trocar para a stack do destino e montar rip/rflags nela
    mov rsp, [rdi + 0x38]
    push qword ptr [rdi + 0x80]   // rip (para o ret final)
    push qword ptr [rdi + 0x88]   // rflags (para o popfq)

    mov rbx, [rdi + 0x08]
    mov rcx, [rdi + 0x10]
    mov rdx, [rdi + 0x18]
    mov rsi, [rdi + 0x20]
    mov rbp, [rdi + 0x30]
    mov r8,  [rdi + 0x40]
    mov r9,  [rdi + 0x48]
    mov r10, [rdi + 0x50]
    mov r11, [rdi + 0x58]
    mov r12, [rdi + 0x60]
    mov r13, [rdi + 0x68]
    mov r14, [rdi + 0x70]
    mov r15, [rdi + 0x78]
    mov rax, [rdi + 0x00]
    mov rdi, [rdi + 0x28]

    popfq
    ret

// void task_enter_usermode(u64 entry /*rdi*/, u64 user_rsp /*rsi*/,
//                          u64 cr3 /*rdx*/) -> !
//
// Primeira entrada em Ring 3: carrega o CR3 da task, monta o frame
// SS/RSP/RFLAGS|IF/CS/RIP e executa iretq. DS/ES recebem o seletor de
// dados do usuário antes (senão o primeiro acesso a dados em Ring 3
// gera #GP).
.global task_enter_usermode
task_enter_usermode:
    cli
    mov ax, 0x23
    mov ds, ax
    mov es, ax

    mov cr3, rdx

    push 0x23          // SS (user data, RPL 3)
    push rsi           // RSP do usuário
    pushfq
    pop rax
    or rax, 0x200      // IF=1
    push rax           // RFLAGS
    push 0x2B          // CS (user code 64-bit, RPL 3)
    push rdi           // RIP
    iretq
"#
);

extern "C" {
    /// Troca cooperativa: salva em `old`, restaura `new`.
    pub fn task_switch(old: *mut Registers, new: *const Registers);
    /// Restaura `regs` integralmente e salta para o RIP salvo.
    pub fn task_restore(regs: *const Registers) -> !;
    /// Entra em modo usuário pela primeira vez.
    pub fn task_enter_usermode(entry: u64, user_rsp: u64, cr3: u64) -> !;
}

/// Primeiro RIP de toda task de usuário.
///
/// O contexto inicial roda em Ring 0 na stack de kernel da task, com o
/// destino estagiado em registradores callee-saved:
/// r12 = entry point do usuário, r13 = RSP de usuário, r14 = CR3.
/// Assim a primeira entrada em Ring 3 passa pelos caminhos NORMAIS de
/// troca (task_switch/task_restore) e termina no `iretq` de
/// `task_enter_usermode`.
#[unsafe(naked)]
pub extern "C" fn user_entry_trampoline() {
    core::arch::naked_asm!(
        "mov rdi, r12",
        "mov rsi, r13",
        "mov rdx, r14",
        // símbolo global definido no bloco global_asm! acima
        "jmp task_enter_usermode",
    );
}

#[cfg(test)]
mod tests {
    use super::Registers;
    use core::mem::offset_of;

    #[test]
    fn test_asm_offsets() {
        // O assembly acima endereça os campos por offset fixo; qualquer
        // mudança no struct precisa aparecer aqui.
        assert_eq!(offset_of!(Registers, rax), 0x00);
        assert_eq!(offset_of!(Registers, rbx), 0x08);
        assert_eq!(offset_of!(Registers, rcx), 0x10);
        assert_eq!(offset_of!(Registers, rdx), 0x18);
        assert_eq!(offset_of!(Registers, rsi), 0x20);
        assert_eq!(offset_of!(Registers, rdi), 0x28);
        assert_eq!(offset_of!(Registers, rbp), 0x30);
        assert_eq!(offset_of!(Registers, rsp), 0x38);
        assert_eq!(offset_of!(Registers, r8), 0x40);
        assert_eq!(offset_of!(Registers, r15), 0x78);
        assert_eq!(offset_of!(Registers, rip), 0x80);
        assert_eq!(offset_of!(Registers, rflags), 0x88);
        assert_eq!(offset_of!(Registers, cr3), 0x90);
        assert_eq!(core::mem::size_of::<Registers>(), 0x98);
    }

    #[test]
    fn test_new_context_has_if_set() {
        let r = Registers::new();
        assert_eq!(r.rflags & 0x200, 0x200);
    }
}
