mod schema;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use chrono::Utc;
use rusqlite::{types::Type, Connection, OptionalExtension, Row};
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use crate::models::*;
use crate::store::EntityStore;

const EMPLOYEE_COLUMNS: &str = "id, name, role, tags, enrolled_courses, completed_courses, badges, \
     balance, active_projects, completed_projects, created_at, updated_at";

const PROJECT_COLUMNS: &str = "id, title, code, description, tasks, deadline, status, \
     assigned_employees, tags, reward, created_at, updated_at";

const COURSE_COLUMNS: &str = "id, title, difficulty, tags, badges, reward";

/// SQLite-backed [`EntityStore`].
///
/// Reference sets are JSON arrays in TEXT columns. Every set operation is a
/// read-modify-write of one row performed while holding the connection lock,
/// which makes it atomic for that row. Nothing here spans two rows.
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn default_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("", "", "crewledger")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        Ok(dirs.data_dir().join("crewledger.db"))
    }

    pub fn open_default() -> Result<Self> {
        Self::open(Self::default_path()?)
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn()?;
        schema::run_migrations(&conn)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("database lock poisoned"))
    }

    /// Apply `f` to one employee row under the lock. Writes only if `f`
    /// changed something. Returns the resulting record and `f`'s output.
    fn modify_employee<R>(
        &self,
        id: &str,
        f: impl FnOnce(&mut Employee) -> R,
    ) -> Result<Option<(Employee, R)>> {
        let conn = self.conn()?;
        let Some(mut employee) = select_employee(&conn, id)? else {
            return Ok(None);
        };

        let before = employee.clone();
        let out = f(&mut employee);
        if employee != before {
            employee.updated_at = Utc::now();
            write_employee(&conn, &employee)?;
        }
        Ok(Some((employee, out)))
    }

    fn modify_project<R>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut Project) -> R,
    ) -> Result<Option<(Project, R)>> {
        let conn = self.conn()?;
        let Some(mut project) = select_project(&conn, id)? else {
            return Ok(None);
        };

        let before = project.clone();
        let out = f(&mut project);
        if project != before {
            project.updated_at = Utc::now();
            write_project(&conn, &project)?;
        }
        Ok(Some((project, out)))
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

impl EntityStore for Database {
    // ============================================================
    // Employee operations
    // ============================================================

    fn get_employee(&self, id: &str) -> Result<Option<Employee>> {
        select_employee(&*self.conn()?, id)
    }

    fn find_employees(&self, ids: &[String]) -> Result<Vec<Employee>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        query_employees(
            &*self.conn()?,
            "WHERE id IN (SELECT value FROM json_each(?1))",
            [to_json(&ids)?],
        )
    }

    fn get_all_employees(&self) -> Result<Vec<Employee>> {
        query_employees(&*self.conn()?, "", [])
    }

    fn employees_referencing_project(&self, project_id: Uuid) -> Result<Vec<Employee>> {
        query_employees(
            &*self.conn()?,
            "WHERE EXISTS (SELECT 1 FROM json_each(employees.active_projects) WHERE value = ?1)
                OR EXISTS (SELECT 1 FROM json_each(employees.completed_projects) WHERE value = ?1)",
            [project_id.to_string()],
        )
    }

    fn create_employee(&self, input: CreateEmployeeInput) -> Result<Employee> {
        let conn = self.conn()?;
        let now = Utc::now();

        conn.execute(
            "INSERT INTO employees (id, name, role, tags, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            (
                &input.id,
                &input.name,
                input.role.as_str(),
                to_json(&input.tags)?,
                now.to_rfc3339(),
                now.to_rfc3339(),
            ),
        )?;

        Ok(Employee {
            id: input.id,
            name: input.name,
            role: input.role,
            tags: input.tags,
            enrolled_courses: BTreeSet::new(),
            completed_courses: BTreeSet::new(),
            badges: Vec::new(),
            balance: 0.0,
            active_projects: BTreeSet::new(),
            completed_projects: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        })
    }

    fn delete_employee(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let rows = conn.execute("DELETE FROM employees WHERE id = ?", [id])?;
        Ok(rows > 0)
    }

    fn add_active_project(&self, employee_id: &str, project_id: Uuid) -> Result<Option<Employee>> {
        let updated = self.modify_employee(employee_id, |e| {
            e.completed_projects.remove(&project_id);
            e.active_projects.insert(project_id);
        })?;
        Ok(updated.map(|(employee, ())| employee))
    }

    fn pull_project(&self, employee_id: &str, project_id: Uuid) -> Result<Option<Employee>> {
        let updated = self.modify_employee(employee_id, |e| {
            e.active_projects.remove(&project_id);
            e.completed_projects.remove(&project_id);
        })?;
        Ok(updated.map(|(employee, ())| employee))
    }

    fn settle_project(
        &self,
        employee_id: &str,
        project_id: Uuid,
        reward: f64,
    ) -> Result<Option<bool>> {
        let updated = self.modify_employee(employee_id, |e| {
            if e.completed_projects.contains(&project_id) {
                return false;
            }
            e.active_projects.remove(&project_id);
            e.completed_projects.insert(project_id);
            e.balance += reward;
            true
        })?;
        Ok(updated.map(|(_, credited)| credited))
    }

    fn enroll_course(&self, employee_id: &str, course_id: Uuid) -> Result<Option<bool>> {
        let updated = self.modify_employee(employee_id, |e| {
            if e.completed_courses.contains(&course_id) {
                return false;
            }
            e.enrolled_courses.insert(course_id)
        })?;
        Ok(updated.map(|(_, enrolled)| enrolled))
    }

    fn settle_course(
        &self,
        employee_id: &str,
        settlement: &CourseSettlement,
    ) -> Result<Option<bool>> {
        let updated = self.modify_employee(employee_id, |e| {
            if e.completed_courses.contains(&settlement.course_id) {
                return false;
            }
            e.enrolled_courses.remove(&settlement.course_id);
            e.completed_courses.insert(settlement.course_id);
            e.badges.extend(settlement.badges.iter().cloned());
            e.balance += settlement.reward;
            true
        })?;
        Ok(updated.map(|(_, credited)| credited))
    }

    fn reset_balance(&self, employee_id: &str) -> Result<Option<f64>> {
        let updated =
            self.modify_employee(employee_id, |e| std::mem::replace(&mut e.balance, 0.0))?;
        Ok(updated.map(|(_, previous)| previous))
    }

    // ============================================================
    // Project operations
    // ============================================================

    fn get_project(&self, id: Uuid) -> Result<Option<Project>> {
        select_project(&*self.conn()?, id)
    }

    fn get_projects(&self, statuses: &[ProjectStatus]) -> Result<Vec<Project>> {
        let conn = self.conn()?;
        if statuses.is_empty() {
            return query_projects(&conn, "", []);
        }
        let names: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();
        query_projects(
            &conn,
            "WHERE status IN (SELECT value FROM json_each(?1))",
            [to_json(&names)?],
        )
    }

    fn projects_assigned_to(&self, employee_id: &str) -> Result<Vec<Project>> {
        query_projects(
            &*self.conn()?,
            "WHERE EXISTS (SELECT 1 FROM json_each(projects.assigned_employees) WHERE value = ?1)",
            [employee_id],
        )
    }

    fn create_project(
        &self,
        input: &CreateProjectInput,
        status: ProjectStatus,
    ) -> Result<Project> {
        let conn = self.conn()?;
        let id = Uuid::new_v4();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO projects (id, title, code, description, tasks, deadline, status, tags, reward, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            (
                id.to_string(),
                &input.title,
                &input.code,
                &input.description,
                to_json(&input.tasks)?,
                &input.deadline,
                status.as_str(),
                to_json(&input.tags)?,
                input.reward,
                now.to_rfc3339(),
                now.to_rfc3339(),
            ),
        )?;

        Ok(Project {
            id,
            title: input.title.clone(),
            code: input.code.clone(),
            description: input.description.clone(),
            tasks: input.tasks.clone(),
            deadline: input.deadline.clone(),
            status,
            assigned_employees: BTreeSet::new(),
            tags: input.tags.clone(),
            reward: input.reward,
            created_at: now,
            updated_at: now,
        })
    }

    fn update_project_details(
        &self,
        id: Uuid,
        input: UpdateProjectInput,
    ) -> Result<Option<Project>> {
        let updated = self.modify_project(id, |p| {
            if let Some(title) = input.title {
                p.title = title;
            }
            if let Some(code) = input.code {
                p.code = code;
            }
            if let Some(tasks) = input.tasks {
                p.tasks = tasks;
            }
            if let Some(tags) = input.tags {
                p.tags = tags;
            }
            if let Some(reward) = input.reward {
                p.reward = reward;
            }
            p.description = input.description.or(p.description.take());
            p.deadline = input.deadline.or(p.deadline.take());
        })?;
        Ok(updated.map(|(project, ())| project))
    }

    fn set_project_status(&self, id: Uuid, status: ProjectStatus) -> Result<Option<Project>> {
        let updated = self.modify_project(id, |p| p.status = status)?;
        Ok(updated.map(|(project, ())| project))
    }

    fn write_assignment(
        &self,
        id: Uuid,
        assigned: &BTreeSet<String>,
        status: ProjectStatus,
    ) -> Result<Option<Project>> {
        let updated = self.modify_project(id, |p| {
            p.assigned_employees = assigned.clone();
            p.status = status;
        })?;
        Ok(updated.map(|(project, ())| project))
    }

    fn add_assignee(
        &self,
        id: Uuid,
        employee_id: &str,
        lifecycle: fn(&mut Project) -> bool,
    ) -> Result<Option<Project>> {
        let updated = self.modify_project(id, |p| {
            p.assigned_employees.insert(employee_id.to_string());
            lifecycle(p);
        })?;
        Ok(updated.map(|(project, ())| project))
    }

    fn pull_assignee(&self, id: Uuid, employee_id: &str) -> Result<Option<Project>> {
        let updated = self.modify_project(id, |p| {
            p.assigned_employees.remove(employee_id);
        })?;
        Ok(updated.map(|(project, ())| project))
    }

    fn delete_project(&self, id: Uuid) -> Result<bool> {
        let conn = self.conn()?;
        let rows = conn.execute("DELETE FROM projects WHERE id = ?", [id.to_string()])?;
        Ok(rows > 0)
    }

    // ============================================================
    // Course operations
    // ============================================================

    fn get_course(&self, id: Uuid) -> Result<Option<Course>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = ?");
        Ok(conn
            .query_row(&sql, [id.to_string()], course_from_row)
            .optional()?)
    }

    fn get_all_courses(&self) -> Result<Vec<Course>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {COURSE_COLUMNS} FROM courses ORDER BY title");
        let mut stmt = conn.prepare(&sql)?;
        let courses = stmt
            .query_map([], course_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(courses)
    }

    fn create_course(&self, input: CreateCourseInput) -> Result<Course> {
        let conn = self.conn()?;
        let id = Uuid::new_v4();

        conn.execute(
            "INSERT INTO courses (id, title, difficulty, tags, badges, reward)
             VALUES (?, ?, ?, ?, ?, ?)",
            (
                id.to_string(),
                &input.title,
                &input.difficulty,
                to_json(&input.tags)?,
                to_json(&input.badges)?,
                input.reward,
            ),
        )?;

        Ok(Course {
            id,
            title: input.title,
            difficulty: input.difficulty,
            tags: input.tags,
            badges: input.badges,
            reward: input.reward,
        })
    }
}

// ============================================================
// Row helpers
// ============================================================

fn select_employee(conn: &Connection, id: &str) -> Result<Option<Employee>> {
    let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ?");
    Ok(conn.query_row(&sql, [id], employee_from_row).optional()?)
}

fn query_employees(
    conn: &Connection,
    filter: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<Employee>> {
    let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees {filter} ORDER BY id");
    let mut stmt = conn.prepare(&sql)?;
    let employees = stmt
        .query_map(params, employee_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(employees)
}

fn write_employee(conn: &Connection, e: &Employee) -> Result<()> {
    conn.execute(
        "UPDATE employees SET name = ?, role = ?, tags = ?, enrolled_courses = ?, completed_courses = ?,
             badges = ?, balance = ?, active_projects = ?, completed_projects = ?, updated_at = ?
         WHERE id = ?",
        (
            &e.name,
            e.role.as_str(),
            to_json(&e.tags)?,
            to_json(&e.enrolled_courses)?,
            to_json(&e.completed_courses)?,
            to_json(&e.badges)?,
            e.balance,
            to_json(&e.active_projects)?,
            to_json(&e.completed_projects)?,
            e.updated_at.to_rfc3339(),
            &e.id,
        ),
    )?;
    Ok(())
}

fn employee_from_row(row: &Row) -> rusqlite::Result<Employee> {
    Ok(Employee {
        id: row.get(0)?,
        name: row.get(1)?,
        role: Role::from_str(&row.get::<_, String>(2)?).unwrap_or_default(),
        tags: json_column(row, 3)?,
        enrolled_courses: json_column(row, 4)?,
        completed_courses: json_column(row, 5)?,
        badges: json_column(row, 6)?,
        balance: row.get(7)?,
        active_projects: json_column(row, 8)?,
        completed_projects: json_column(row, 9)?,
        created_at: parse_datetime(row.get::<_, String>(10)?),
        updated_at: parse_datetime(row.get::<_, String>(11)?),
    })
}

fn select_project(conn: &Connection, id: Uuid) -> Result<Option<Project>> {
    let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?");
    Ok(conn
        .query_row(&sql, [id.to_string()], project_from_row)
        .optional()?)
}

fn query_projects(
    conn: &Connection,
    filter: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<Project>> {
    let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects {filter} ORDER BY title");
    let mut stmt = conn.prepare(&sql)?;
    let projects = stmt
        .query_map(params, project_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(projects)
}

fn write_project(conn: &Connection, p: &Project) -> Result<()> {
    conn.execute(
        "UPDATE projects SET title = ?, code = ?, description = ?, tasks = ?, deadline = ?, status = ?,
             assigned_employees = ?, tags = ?, reward = ?, updated_at = ?
         WHERE id = ?",
        (
            &p.title,
            &p.code,
            &p.description,
            to_json(&p.tasks)?,
            &p.deadline,
            p.status.as_str(),
            to_json(&p.assigned_employees)?,
            to_json(&p.tags)?,
            p.reward,
            p.updated_at.to_rfc3339(),
            p.id.to_string(),
        ),
    )?;
    Ok(())
}

fn project_from_row(row: &Row) -> rusqlite::Result<Project> {
    Ok(Project {
        id: parse_uuid(row.get::<_, String>(0)?),
        title: row.get(1)?,
        code: row.get(2)?,
        description: row.get(3)?,
        tasks: json_column(row, 4)?,
        deadline: row.get(5)?,
        status: status_column(row, 6)?,
        assigned_employees: json_column(row, 7)?,
        tags: json_column(row, 8)?,
        reward: row.get(9)?,
        created_at: parse_datetime(row.get::<_, String>(10)?),
        updated_at: parse_datetime(row.get::<_, String>(11)?),
    })
}

fn course_from_row(row: &Row) -> rusqlite::Result<Course> {
    Ok(Course {
        id: parse_uuid(row.get::<_, String>(0)?),
        title: row.get(1)?,
        difficulty: row.get(2)?,
        tags: json_column(row, 3)?,
        badges: json_column(row, 4)?,
        reward: row.get(5)?,
    })
}

/// An unknown status is a hard error: reading it as `upcoming` would reopen
/// a completed project to membership edits.
fn status_column(row: &Row, idx: usize) -> rusqlite::Result<ProjectStatus> {
    let raw: String = row.get(idx)?;
    ProjectStatus::from_str(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unknown project status: {}", raw).into(),
        )
    })
}

/// Decode a JSON TEXT column. A malformed set is a hard error: defaulting
/// it to empty would erase references on the next write.
fn json_column<T: DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

fn parse_uuid(s: String) -> Uuid {
    Uuid::parse_str(&s).unwrap_or_else(|_| Uuid::nil())
}

fn parse_datetime(s: String) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
