//! Task Control Block e a arena de tasks.
//!
//! A arena tem `MAX_TASKS` slots de `Option<Box<Task>>`; a task idle
//! (tid 0, modo kernel, rodando na stack de boot) ocupa o slot 0 e
//! nunca entra na fila ready. Slots de tasks mortas são recolhidos
//! preguiçosamente na criação seguinte.

use super::context::Registers;
use crate::fs::vfs::FdTable;
use crate::mm::config::{
    FRAME_SIZE, KERNEL_STACK_SIZE, USER_STACK_BASE, USER_STACK_SIZE,
};
use crate::mm::paging::{self, MapFlags};
use crate::mm::pmm;
use crate::sync::Spinlock;
use alloc::boxed::Box;

pub const MAX_TASKS: usize = 64;

/// Quantum default em ticks.
pub const TIME_SLICE_DEFAULT: u64 = 10;

pub type Tid = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Ready,
    Running,
    Blocked,
    Dead,
}

/// Task Control Block.
pub struct Task {
    pub tid: Tid,
    pub name: [u8; 32],
    pub state: TaskState,
    /// true = roda em Ring 0 compartilhando o CR3 do kernel
    pub kernel_mode: bool,
    pub regs: Registers,
    /// Topo da stack de kernel (RSP0/syscall RSP desta task).
    pub kernel_stack: u64,
    /// Base física das páginas da stack de usuário (0 para kernel).
    pub user_stack: u64,
    /// PML4 da task (== CR3).
    pub pml4_phys: u64,
    /// Base e tamanho corrente do program break (sbrk).
    pub user_brk: u64,
    pub user_brk_size: u64,
    pub time_slice: u64,
    pub total_time: u64,
    pub fds: FdTable,
}

impl Task {
    pub fn name_str(&self) -> &str {
        let len = self.name.iter().position(|&b| b == 0).unwrap_or(32);
        core::str::from_utf8(&self.name[..len]).unwrap_or("?")
    }
}

fn copy_name(name: &str) -> [u8; 32] {
    let mut buf = [0u8; 32];
    let bytes = name.as_bytes();
    let len = bytes.len().min(31);
    buf[..len].copy_from_slice(&bytes[..len]);
    buf
}

/// Arena global de tasks.
pub struct TaskTable {
    slots: [Option<Box<Task>>; MAX_TASKS],
    next_tid: Tid,
    enabled: bool,
}

impl TaskTable {
    pub const fn new() -> Self {
        Self {
            slots: [const { None }; MAX_TASKS],
            next_tid: 1,
            enabled: false,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn get(&self, tid: Tid) -> Option<&Task> {
        self.slots
            .iter()
            .flatten()
            .find(|t| t.tid == tid)
            .map(|b| b.as_ref())
    }

    pub fn get_mut(&mut self, tid: Tid) -> Option<&mut Task> {
        self.slots
            .iter_mut()
            .flatten()
            .find(|t| t.tid == tid)
            .map(|b| b.as_mut())
    }

    /// Coleta preguiçosa: libera um slot Dead (exceto o corrente) e
    /// devolve a stack de kernel ao PMM.
    fn reap_one(&mut self, current: Tid) {
        for slot in self.slots.iter_mut().skip(1) {
            let dead = matches!(slot, Some(t) if t.state == TaskState::Dead && t.tid != current);
            if dead {
                if let Some(t) = slot.take() {
                    if t.kernel_stack >= KERNEL_STACK_SIZE {
                        pmm::free_frame(crate::mm::PhysAddr::new(
                            t.kernel_stack - KERNEL_STACK_SIZE,
                        ));
                    }
                }
                return;
            }
        }
    }

    fn free_slot(&mut self) -> Option<usize> {
        self.slots.iter().skip(1).position(|s| s.is_none()).map(|i| i + 1)
    }

    /// Tasks não-mortas na arena.
    pub fn live_count(&self) -> usize {
        self.slots
            .iter()
            .flatten()
            .filter(|t| t.state != TaskState::Dead)
            .count()
    }

    /// Itera sobre todas as tasks vivas (diagnóstico do shell).
    pub fn for_each_live(&self, mut f: impl FnMut(&Task)) {
        for t in self.slots.iter().flatten() {
            if t.state != TaskState::Dead {
                f(t);
            }
        }
    }
}

pub static TASKS: Spinlock<TaskTable> = Spinlock::new(TaskTable::new());

/// Inicializa o sistema de tasks: a task idle (tid 0) é o contexto que
/// está executando agora, com o CR3 e a stack de boot.
pub fn task_init() {
    let mut table = TASKS.lock();

    let mut idle = Box::new(Task {
        tid: 0,
        name: copy_name("idle"),
        state: TaskState::Running,
        kernel_mode: true,
        regs: Registers::new(),
        kernel_stack: 0,
        user_stack: 0,
        pml4_phys: crate::arch::x86_64::cpu::read_cr3(),
        user_brk: 0,
        user_brk_size: 0,
        time_slice: TIME_SLICE_DEFAULT,
        total_time: 0,
        fds: FdTable::with_std_fds(),
    });
    idle.regs.cr3 = idle.pml4_phys;

    table.slots[0] = Some(idle);
    table.enabled = true;

    crate::kinfo!("(Task) multitarefa inicializada (idle = tid 0)");
}

/// Cria uma task nova em estado `Ready` (nunca enfileirada aqui —
/// `task_ready` é um passo separado).
///
/// - modo kernel: compartilha o CR3 vivo; a stack ganha `task_exit`
///   como endereço de retorno para que o fim de `entry` encerre limpo;
/// - modo usuário: PML4 própria via `create_user_pml4` + 4 páginas de
///   stack mapeadas em `USER_STACK_BASE`, topo arredondado para 16
///   bytes com `argc = 0` no topo.
pub fn task_create(entry: fn(), name: &str, kernel_mode: bool) -> Option<Tid> {
    let mut table = TASKS.lock();
    if !table.enabled {
        crate::kwarn!("(Task) task_create antes do task_init");
        return None;
    }

    let current = super::scheduler::task_current_tid();
    table.reap_one(current);

    let slot = match table.free_slot() {
        Some(s) => s,
        None => {
            crate::kwarn!("(Task) sem slots livres");
            return None;
        }
    };

    let tid = table.next_tid;

    // stack de kernel: 1 frame, topo no fim
    let kstack_frame = pmm::alloc_frame()?;
    let kstack_top = kstack_frame.as_u64() + KERNEL_STACK_SIZE;

    let mut task = Box::new(Task {
        tid,
        name: copy_name(name),
        state: TaskState::Ready,
        kernel_mode,
        regs: Registers::new(),
        kernel_stack: kstack_top,
        user_stack: 0,
        pml4_phys: 0,
        user_brk: 0,
        user_brk_size: 0,
        time_slice: TIME_SLICE_DEFAULT,
        total_time: 0,
        fds: if kernel_mode {
            FdTable::with_std_fds()
        } else {
            FdTable::new()
        },
    });

    if kernel_mode {
        let cr3 = crate::arch::x86_64::cpu::read_cr3();
        task.pml4_phys = cr3;
        task.regs.cr3 = cr3;

        // semear task_exit como retorno de `entry`
        let rsp = kstack_top - 8;
        // SAFETY: frame da stack recém-alocado, identity-mapped
        unsafe {
            core::ptr::write_volatile(
                rsp as *mut u64,
                super::scheduler::task_exit_thunk as usize as u64,
            );
        }
        task.regs.rsp = rsp;
        task.regs.rip = entry as usize as u64;
    } else {
        let pml4 = match paging::create_user_pml4() {
            Some(p) => p,
            None => {
                pmm::free_frame(kstack_frame);
                return None;
            }
        };
        task.pml4_phys = pml4;
        task.regs.cr3 = pml4;

        if !setup_user_stack(&mut task, pml4) {
            pmm::free_frame(kstack_frame);
            return None;
        }

        // A primeira execução passa pelo trampolim em Ring 0 (na stack
        // de kernel), que lê r12/r13/r14 e faz o iretq para Ring 3.
        // r13 (RSP de usuário) foi definido por setup_user_stack;
        // o loader ELF sobrescreve r12 com o e_entry real.
        task.regs.rip = super::context::user_entry_trampoline as usize as u64;
        task.regs.rsp = kstack_top;
        task.regs.r12 = entry as usize as u64;
        task.regs.r14 = pml4;
    }

    table.next_tid += 1;
    table.slots[slot] = Some(task);

    crate::kdebug!("(Task) criada '{}' (tid={})", name, tid);
    Some(tid)
}

/// Aloca, zera e mapeia as 4 páginas da stack de usuário; configura
/// `regs.rsp` com o topo 16-alinhado e `argc = 0` empilhado.
fn setup_user_stack(task: &mut Task, pml4: u64) -> bool {
    let pages = USER_STACK_SIZE / FRAME_SIZE;
    let flags = MapFlags::PRESENT | MapFlags::WRITABLE | MapFlags::USER;

    let mut first_phys = 0u64;
    let mut last_phys = 0u64;

    for i in 0..pages {
        let frame = match pmm::alloc_frame() {
            Some(f) => f,
            None => return false,
        };
        let phys = frame.as_u64();
        if i == 0 {
            first_phys = phys;
        }
        last_phys = phys;

        // zerar pela janela identity
        // SAFETY: frame exclusivo e identity-mapped
        unsafe {
            core::ptr::write_bytes(phys as *mut u8, 0, FRAME_SIZE as usize);
        }

        let virt = USER_STACK_BASE + i * FRAME_SIZE;
        if paging::map_page_64(pml4, phys, virt, flags).is_err() {
            return false;
        }
    }

    task.user_stack = first_phys;

    // topo 16-alinhado com argc=0 e argv terminador nulos visíveis em [rsp]
    let stack_top = (USER_STACK_BASE + USER_STACK_SIZE) & !0xF;
    let user_rsp = stack_top - 16;
    // os últimos 16 bytes vivem no último frame mapeado
    let top_off = (FRAME_SIZE - 16) as usize;
    // SAFETY: último frame da stack, identity-mapped
    unsafe {
        core::ptr::write_volatile((last_phys as usize + top_off) as *mut u64, 0); // argc
        core::ptr::write_volatile((last_phys as usize + top_off + 8) as *mut u64, 0); // argv[0]
    }
    // estagiar para o trampolim de entrada (ver context.rs)
    task.regs.r13 = user_rsp;

    true
}
