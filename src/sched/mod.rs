//! Scheduler e tasks: TCB, fila ready, troca de contexto e loader ELF.

pub mod context;
pub mod elf;
pub mod runqueue;
pub mod scheduler;
pub mod task;
pub mod test;

pub use scheduler::{task_current_tid, task_exit, task_schedule, task_yield};
pub use task::{Task, TaskState, Tid};
