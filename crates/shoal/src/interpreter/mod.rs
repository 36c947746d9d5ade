//! Interpreter for executing shoal scripts
//!
//! Every executor takes the shell mutably plus the [`Io`] it runs with.
//! Streams are never stored in the shell: a redirection or a pipeline just
//! passes a different `Io` down.

mod pipeline;
mod redirect;
mod state;

pub use state::{ExecResult, ExitStatus, Flow};

use futures_util::future::BoxFuture;
use tracing::{debug, warn};

use crate::builtins::Context;
use crate::error::Result;
use crate::io::Io;
use crate::parser::{
    Assignment, CaseCommand, Executer, ForLoop, IfCommand, Loop, Parser, Script, SimpleCommand,
    Word,
};
use crate::process::{CommandKind, Invocation};
use crate::shell::{Environment, Shell};

use redirect::FdTable;

impl Shell {
    /// Run a parsed script and return the status of its last command.
    pub async fn run_script(&mut self, script: &Script, io: &Io) -> Result<ExitStatus> {
        let flow = self.exec_list(&script.commands, io).await?;
        Ok(flow.status())
    }

    /// Run statements in order. Loop control stops the sequence and is
    /// handed to the caller.
    pub(crate) fn exec_list<'a>(
        &'a mut self,
        commands: &'a [Executer],
        io: &'a Io,
    ) -> BoxFuture<'a, Result<Flow>> {
        Box::pin(async move {
            let mut status = ExitStatus::SUCCESS;
            for command in commands {
                match self.execute(command, io).await? {
                    Flow::Normal(s) => status = s,
                    flow => return Ok(flow),
                }
            }
            Ok(Flow::Normal(status))
        })
    }

    /// Run one statement and record its status as `$?`.
    pub(crate) fn execute<'a>(
        &'a mut self,
        command: &'a Executer,
        io: &'a Io,
    ) -> BoxFuture<'a, Result<Flow>> {
        Box::pin(async move {
            let flow = match command {
                Executer::Simple(cmd) => Flow::Normal(self.exec_simple(cmd, io).await?),
                Executer::Pipeline(stages) => Flow::Normal(self.exec_pipeline(stages, io).await?),
                Executer::And(lhs, rhs) => match self.execute(lhs, io).await? {
                    Flow::Normal(status) if status.is_success() => self.execute(rhs, io).await?,
                    flow => flow,
                },
                Executer::Or(lhs, rhs) => match self.execute(lhs, io).await? {
                    Flow::Normal(status) if !status.is_success() => self.execute(rhs, io).await?,
                    flow => flow,
                },
                Executer::List(commands) => self.exec_list(commands, io).await?,
                Executer::Assign(assignment) => {
                    self.counters.tick_command(&self.limits)?;
                    Flow::Normal(self.exec_assignment(assignment, io).await?)
                }
                Executer::Subshell(body) => {
                    let mut child = self.subshell()?;
                    debug!(depth = child.counters.subshell_depth, "subshell");
                    Flow::Normal(child.exec_list(body, io).await?.status())
                }
                Executer::For(for_loop) => self.exec_for(for_loop, io).await?,
                Executer::While(body) => self.exec_loop(body, true, io).await?,
                Executer::Until(body) => self.exec_loop(body, false, io).await?,
                Executer::If(if_command) => self.exec_if(if_command, io).await?,
                Executer::Case(case) => self.exec_case(case, io).await?,
                Executer::Test(test) => {
                    Flow::Normal(ExitStatus::from_bool(self.eval_test(test, io).await?))
                }
                Executer::Redirected(inner, redirects) => {
                    let mut table = FdTable::new(io);
                    table.apply(redirects, self).await?;
                    let redirected = table.io();
                    let result = self.execute(inner, &redirected).await;
                    drop(redirected);
                    let closed = table.close().await;
                    let flow = result?;
                    closed?;
                    flow
                }
                Executer::Break => Flow::Break,
                Executer::Continue => Flow::Continue,
            };
            if let Flow::Normal(status) = flow {
                self.last.status = status;
            }
            Ok(flow)
        })
    }

    async fn exec_assignment(&mut self, assignment: &Assignment, io: &Io) -> Result<ExitStatus> {
        self.subst_status = None;
        let value = self.expand_single(&assignment.value, io).await?;
        debug!(
            name = %assignment.name,
            value = %self.log.assignment(&assignment.name, &value),
            "assign"
        );
        self.define(&assignment.name, vec![value])?;
        Ok(self.subst_status.take().unwrap_or(ExitStatus::SUCCESS))
    }

    async fn exec_simple(&mut self, cmd: &SimpleCommand, io: &Io) -> Result<ExitStatus> {
        self.counters.tick_command(&self.limits)?;
        self.subst_status = None;

        let words = self.expand_aliases(&cmd.words)?;
        let argv = self.expand_words(&words, io).await?;

        let mut assignments = Vec::with_capacity(cmd.assignments.len());
        for assignment in &cmd.assignments {
            let value = self.expand_single(&assignment.value, io).await?;
            assignments.push((assignment.name.clone(), value));
        }

        let mut table = FdTable::new(io);
        table.apply(&cmd.redirects, self).await?;
        let redirected = table.io();

        let result = if argv.is_empty() {
            // only assignments and redirections
            let mut outcome = Ok(());
            for (name, value) in assignments {
                debug!(name = %name, value = %self.log.assignment(&name, &value), "assign");
                if let Err(err) = self.define(&name, vec![value]) {
                    outcome = Err(err);
                    break;
                }
            }
            outcome.map(|()| self.subst_status.take().unwrap_or(ExitStatus::SUCCESS))
        } else {
            self.dispatch(&argv, assignments, &redirected).await
        };

        drop(redirected);
        let closed = table.close().await;
        let status = result?;
        closed?;
        Ok(status)
    }

    /// Splice in the definition of an alias used as the command name.
    fn expand_aliases(&self, words: &[Word]) -> Result<Vec<Word>> {
        let Some(text) = words
            .first()
            .and_then(Word::as_bare)
            .and_then(|name| self.alias(name))
        else {
            return Ok(words.to_vec());
        };
        let script = Parser::new(text).parse()?;
        let mut expanded = match script.commands.as_slice() {
            [Executer::Simple(simple)] if simple.assignments.is_empty() => simple.words.clone(),
            _ => {
                warn!(alias = %text, "alias is not a simple command, ignored");
                return Ok(words.to_vec());
            }
        };
        expanded.extend(words[1..].iter().cloned());
        Ok(expanded)
    }

    /// Run a builtin or external command with expanded arguments.
    async fn dispatch(
        &mut self,
        argv: &[String],
        assignments: Vec<(String, String)>,
        io: &Io,
    ) -> Result<ExitStatus> {
        let name = &argv[0];
        let args = &argv[1..];
        debug!(command = %name, args = args.len(), "dispatch");

        let kind = match self.builtin(name) {
            Some(builtin) => Some(CommandKind::Builtin(builtin)),
            None => self.finder.find(name, self),
        };

        match kind {
            Some(CommandKind::Builtin(builtin)) => {
                for (var, value) in assignments {
                    self.define(&var, vec![value])?;
                }
                let ctx = Context {
                    args,
                    shell: self,
                    stdin: io.stdin.clone(),
                    stdout: io.stdout.clone(),
                    stderr: io.stderr.clone(),
                };
                builtin.execute(ctx).await
            }
            Some(CommandKind::External(program)) => {
                self.spawn(program, name, args, assignments, io).await
            }
            None => {
                io.stderr
                    .write_str(&format!("{name}: command not found\n"))
                    .await?;
                Ok(ExitStatus::NOT_FOUND)
            }
        }
    }

    async fn spawn(
        &mut self,
        program: std::path::PathBuf,
        name: &str,
        args: &[String],
        assignments: Vec<(String, String)>,
        io: &Io,
    ) -> Result<ExitStatus> {
        let mut env = self.environment();
        for (var, value) in assignments {
            env.retain(|(existing, _)| *existing != var);
            env.push((var, value));
        }
        let invocation = Invocation {
            program,
            name: name.to_string(),
            args: args.to_vec(),
            env,
            cwd: self.cwd().to_path_buf(),
        };

        let mut runner = self.finder.runner(invocation);
        runner.set_stdin(io.stdin.clone());
        runner.set_stdout(io.stdout.clone());
        runner.set_stderr(io.stderr.clone());

        if let Err(err) = runner.start().await {
            let status = if err.kind() == std::io::ErrorKind::PermissionDenied {
                ExitStatus::NOT_EXECUTABLE
            } else {
                ExitStatus::NOT_FOUND
            };
            warn!(command = %name, error = %err, "failed to start command");
            io.stderr.write_str(&format!("{name}: {err}\n")).await?;
            return Ok(status);
        }
        self.last.pid = runner.pid();
        Ok(runner.wait().await?)
    }

    async fn exec_for(&mut self, for_loop: &ForLoop, io: &Io) -> Result<Flow> {
        let values = match &for_loop.words {
            Some(words) => self.expand_words(words, io).await?,
            None => self.last.args.clone(),
        };
        if values.is_empty() {
            return match &for_loop.otherwise {
                Some(otherwise) => self.exec_list(otherwise, io).await,
                None => Ok(Flow::Normal(ExitStatus::SUCCESS)),
            };
        }

        let mut status = ExitStatus::SUCCESS;
        for (iteration, value) in values.into_iter().enumerate() {
            self.limits.check_loop(iteration + 1)?;
            self.define(&for_loop.variable, vec![value])?;
            match self.exec_list(&for_loop.body, io).await? {
                Flow::Normal(s) => status = s,
                Flow::Break => break,
                Flow::Continue => continue,
            }
        }
        Ok(Flow::Normal(status))
    }

    /// `while` when `until` is false, `until` otherwise.
    async fn exec_loop(&mut self, body: &Loop, run_while: bool, io: &Io) -> Result<Flow> {
        let mut status = ExitStatus::SUCCESS;
        let mut iterations = 0;
        loop {
            let condition = match self.exec_list(&body.condition, io).await? {
                Flow::Normal(s) => s,
                Flow::Break => break,
                Flow::Continue => continue,
            };
            if condition.is_success() != run_while {
                break;
            }
            iterations += 1;
            self.limits.check_loop(iterations)?;
            match self.exec_list(&body.body, io).await? {
                Flow::Normal(s) => status = s,
                Flow::Break => break,
                Flow::Continue => continue,
            }
        }
        if iterations == 0 {
            if let Some(otherwise) = &body.otherwise {
                return self.exec_list(otherwise, io).await;
            }
        }
        Ok(Flow::Normal(status))
    }

    async fn exec_if(&mut self, if_command: &IfCommand, io: &Io) -> Result<Flow> {
        let condition = match self.exec_list(&if_command.condition, io).await? {
            Flow::Normal(status) => status,
            flow => return Ok(flow),
        };
        if condition.is_success() {
            self.exec_list(&if_command.consequence, io).await
        } else if let Some(alternative) = &if_command.alternative {
            self.exec_list(alternative, io).await
        } else {
            Ok(Flow::Normal(ExitStatus::SUCCESS))
        }
    }

    async fn exec_case(&mut self, case: &CaseCommand, io: &Io) -> Result<Flow> {
        let word = self.expand_single(&case.word, io).await?;
        for clause in &case.clauses {
            for pattern in &clause.patterns {
                if self.expand_single(pattern, io).await? == word {
                    return self.exec_list(&clause.body, io).await;
                }
            }
        }
        match &case.default {
            Some(default) => self.exec_list(default, io).await,
            None => Ok(Flow::Normal(ExitStatus::SUCCESS)),
        }
    }
}
