//! Round-robin cooperativo + preemptivo por timer.
//!
//! Dois caminhos de troca:
//! - `task_schedule` (cooperativo, via yield/exit/bloqueio): salva o
//!   contexto do chamador com `task_switch` e retorna dentro do
//!   contexto do escolhido;
//! - `task_schedule_from_irq` (preempção): o snapshot completo já foi
//!   salvo no TCB pelo caminho de IRQ, então a retomada é via
//!   `task_restore` — nunca de volta pelo stub de interrupção.
//!
//! Regras de seleção (fila estritamente FIFO):
//! - cabeça da fila; sem fila, idle — mas só se a task corrente morreu
//!   ou não é a idle (a idle continua rodando se está sozinha);
//! - a corrente, se ainda `Running`, vira `Ready` no FIM da fila.

use super::context::{task_restore, task_switch};
use super::runqueue::RUNQUEUE;
use super::task::{TaskState, Tid, TASKS};
use crate::arch::traits::CpuOps;
use crate::arch::x86_64::idt::ContextFrame;
use crate::arch::Cpu;
use core::sync::atomic::{AtomicU32, Ordering};

static CURRENT_TID: AtomicU32 = AtomicU32::new(0);

/// tid da task corrente.
pub fn task_current_tid() -> Tid {
    CURRENT_TID.load(Ordering::Relaxed)
}

/// Executa `f` com o TCB da task corrente.
///
/// O lock da arena fica preso durante `f`: NÃO chamar nada que possa
/// bloquear ou escalonar lá dentro.
pub fn with_current<T>(f: impl FnOnce(&mut super::task::Task) -> T) -> Option<T> {
    let tid = task_current_tid();
    let mut table = TASKS.lock();
    table.get_mut(tid).map(f)
}

/// Coloca uma task na fila ready (FIFO).
pub fn task_ready(tid: Tid) {
    let mut table = TASKS.lock();
    if let Some(t) = table.get_mut(tid) {
        t.state = TaskState::Ready;
        RUNQUEUE.lock().push(tid);
    }
}

/// Seleção round-robin. `None` = continuar na task corrente.
fn select_next(current: Tid) -> Option<Tid> {
    if let Some(next) = RUNQUEUE.lock().pop() {
        return Some(next);
    }

    // fila vazia: idle assume se a corrente morreu ou não é a idle
    let table = TASKS.lock();
    let current_dead = matches!(table.get(current), Some(t) if t.state == TaskState::Dead);
    if current_dead || current != 0 {
        Some(0)
    } else {
        None
    }
}

/// Prepara a troca: reenfileira a corrente (se Running), marca o
/// destino como Running e devolve os ponteiros de contexto.
///
/// Retorna (old, new, kernel_stack_do_destino).
fn commit_switch(current: Tid, next: Tid) -> Option<(*mut super::context::Registers, *const super::context::Registers, u64)> {
    let mut table = TASKS.lock();

    if let Some(cur) = table.get_mut(current) {
        if cur.state == TaskState::Running {
            cur.state = TaskState::Ready;
            RUNQUEUE.lock().push(current);
        }
    }

    let next_task = table.get_mut(next)?;
    next_task.state = TaskState::Running;
    let new_ptr = &next_task.regs as *const _;
    let kstack = next_task.kernel_stack;

    let old_ptr = table.get_mut(current).map(|t| &mut t.regs as *mut _)?;

    CURRENT_TID.store(next, Ordering::Relaxed);
    Some((old_ptr, new_ptr, kstack))
}

/// Atualiza RSP0 do TSS e a stack da entrada `syscall` para o destino.
fn update_kernel_stack(kstack: u64) {
    if kstack != 0 {
        crate::arch::x86_64::gdt::set_kernel_stack(kstack);
        crate::arch::x86_64::syscall::set_kernel_rsp(kstack);
    }
}

/// Escalonamento cooperativo (yield, exit, bloqueio voluntário).
pub fn task_schedule() {
    if !TASKS.lock().enabled() {
        return;
    }

    let were_enabled = Cpu::interrupts_enabled();
    Cpu::disable_interrupts();

    let current = task_current_tid();
    let next = match select_next(current) {
        Some(n) if n != current => n,
        _ => {
            if were_enabled {
                Cpu::enable_interrupts();
            }
            return;
        }
    };

    if let Some((old_ptr, new_ptr, kstack)) = commit_switch(current, next) {
        update_kernel_stack(kstack);
        // SAFETY: ponteiros para TCBs vivos na arena; IRQs desabilitadas
        // até o destino restaurar o próprio RFLAGS
        unsafe {
            task_switch(old_ptr, new_ptr);
        }
        // ...retomado aqui numa troca futura
    }

    if were_enabled {
        Cpu::enable_interrupts();
    }
}

/// Escalonamento a partir de IRQ: o contexto da corrente já está salvo
/// no TCB (ver `preempt_from_irq`); retomar o destino via
/// `task_restore`. Retorna normalmente se não há para quem trocar.
pub fn task_schedule_from_irq() {
    if !TASKS.lock().enabled() {
        return;
    }

    let current = task_current_tid();
    let next = match select_next(current) {
        Some(n) if n != current => n,
        _ => return,
    };

    if let Some((_old, new_ptr, kstack)) = commit_switch(current, next) {
        update_kernel_stack(kstack);
        // SAFETY: contexto completo salvo pelo caminho de IRQ; este
        // caminho abandona o frame do stub (nunca retorna)
        unsafe {
            task_restore(new_ptr);
        }
    }
}

/// Caminho de preempção chamado pelo handler do timer: salva o snapshot
/// do frame de interrupção no TCB corrente e tenta escalonar.
pub fn preempt_from_irq(frame: &ContextFrame) {
    if !TASKS.lock().enabled() {
        return;
    }

    let tid = task_current_tid();
    {
        let mut table = TASKS.lock();
        let task = match table.get_mut(tid) {
            Some(t) => t,
            None => return,
        };

        let r = &mut task.regs;
        r.rax = frame.rax;
        r.rbx = frame.rbx;
        r.rcx = frame.rcx;
        r.rdx = frame.rdx;
        r.rsi = frame.rsi;
        r.rdi = frame.rdi;
        r.rbp = frame.rbp;
        r.r8 = frame.r8;
        r.r9 = frame.r9;
        r.r10 = frame.r10;
        r.r11 = frame.r11;
        r.r12 = frame.r12;
        r.r13 = frame.r13;
        r.r14 = frame.r14;
        r.r15 = frame.r15;
        r.rip = frame.rip;
        r.rflags = frame.rflags;
        r.rsp = frame.rsp;
        r.cr3 = crate::arch::x86_64::cpu::read_cr3();

        task.total_time += 1;
    }

    task_schedule_from_irq();
}

/// Yield voluntário: a corrente vai para o FIM da fila.
pub fn task_yield() {
    task_schedule();
}

/// Troca imediatamente para `tid`, fora da ordem da fila (usado pelo
/// comando `run`). A corrente vai para o fim da fila e retoma quando a
/// task alvo largar a CPU.
pub fn switch_to(tid: Tid) {
    if !TASKS.lock().enabled() {
        return;
    }

    let were_enabled = Cpu::interrupts_enabled();
    Cpu::disable_interrupts();

    let current = task_current_tid();
    if tid != current {
        if let Some((old_ptr, new_ptr, kstack)) = commit_switch(current, tid) {
            update_kernel_stack(kstack);
            // SAFETY: mesmos invariantes do task_schedule
            unsafe {
                task_switch(old_ptr, new_ptr);
            }
        }
    }

    if were_enabled {
        Cpu::enable_interrupts();
    }
}

/// Encerra a task corrente: marca `Dead`, devolve os handles de
/// arquivo e força o reschedule. O slot é recolhido preguiçosamente.
pub fn task_exit() -> ! {
    Cpu::disable_interrupts();

    let tid = task_current_tid();
    {
        let mut table = TASKS.lock();
        if let Some(t) = table.get_mut(tid) {
            t.state = TaskState::Dead;
            t.fds.release_all();
        }
    }

    task_schedule();

    // só chega aqui se não havia para quem trocar (nunca para uma task
    // não-idle, mas o hlt garante que não "caímos" em lixo)
    loop {
        Cpu::enable_interrupts();
        Cpu::halt();
        Cpu::disable_interrupts();
    }
}

/// Endereço de retorno semeado na stack de tasks de kernel: encerra a
/// task quando a função de entrada retorna.
pub extern "C" fn task_exit_thunk() {
    task_exit();
}

/// Quantidade de tasks vivas (diagnóstico).
pub fn live_tasks() -> usize {
    TASKS.lock().live_count()
}
